mod format;
mod lens;
mod relay;

pub use lens::LensAnnotation;
pub use relay::ConsoleRelayHandle;
pub use relay::subscribe;
