pub mod document;
pub mod page_image;
pub mod temp_upload;

pub use document::{DocumentLoader, PageSource, PdfiumLoader};
pub use page_image::PageImage;
pub use temp_upload::TempUpload;
