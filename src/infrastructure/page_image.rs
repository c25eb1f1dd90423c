//! 页面图片编码
//!
//! 学生记录里保存的是 PNG 的 base64 文本；评分时再还原为 PNG 字节。

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::LlmError;

/// 一页已渲染的 PNG 图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl PageImage {
    /// 将渲染结果编码为 PNG
    pub fn from_image(image: &DynamicImage) -> image::ImageResult<Self> {
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(Self {
            png,
            width: image.width(),
            height: image.height(),
        })
    }

    /// 从存储的 base64 文本还原，只读取 PNG 头部校验尺寸
    pub fn from_base64(encoded: &str) -> Result<Self, LlmError> {
        let png = STANDARD
            .decode(encoded.trim())
            .map_err(|e| LlmError::InvalidImage(format!("base64 解码失败: {}", e)))?;

        let reader = ImageReader::with_format(Cursor::new(&png), ImageFormat::Png);
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| LlmError::InvalidImage(format!("不是有效的 PNG: {}", e)))?;

        Ok(Self { png, width, height })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.png)
    }

    /// Vision API 使用的 data URL
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.to_base64())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
