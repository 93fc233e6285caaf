pub mod codecraft;
pub mod easydata;
mod error;
pub mod jaybart;
pub mod jesco;

pub use codecraft::{CodeCraftAdapter, CodeCraftConfig};
pub use easydata::{EasyDataAdapter, EasyDataConfig};
pub use error::ProviderCallError;
pub use jaybart::{JaybartAdapter, JaybartConfig};
pub use jesco::{JescoAdapter, JescoConfig};
