pub mod backend;
pub mod exam_client;
pub mod exam_page;

pub use backend::ExamBackend;
pub use exam_client::HttpExamBackend;
pub use exam_page::{parse_exam_page, ExamPage};
