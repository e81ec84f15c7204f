pub mod prediction;
pub mod quota;
pub mod session;
pub mod story;

pub use prediction::*;
pub use quota::*;
pub use session::*;
pub use story::*;
