// Platform-specific code module

pub mod classifier;

pub use classifier::{
    platform_classifier, LinuxClassifier, MacClassifier, SystemProcessClassifier,
    WindowsClassifier,
};
