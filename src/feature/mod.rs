//! Installable feature records.
//!
//! A [`Feature`] pairs common bookkeeping (identifier, descriptions,
//! enabled and available flags) with [`FeatureDetails`] specific to its
//! [`FeatureKind`].

mod descriptor;
mod kind;
mod packages;

pub use descriptor::{DependencySpec, Feature, FeatureDetails};
pub use kind::FeatureKind;
pub(crate) use packages::declared;
pub use packages::PackageSpecs;
