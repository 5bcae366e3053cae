pub mod notifier;
pub mod observer;

pub use notifier::BatchNotifier;
pub use observer::BatchObserver;
