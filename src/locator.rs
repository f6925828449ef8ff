//! Locator utilities
//!
//! Every resource the server returns refers to other resources by a `selfUrl`
//! such as `https://www.virtualskeleton.ch/api/objects/42`. The trailing path
//! segment of such a locator is the id of the referenced resource.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("The locator has no trailing path segment: {0}")]
    NoSegment(String),
    #[error("The trailing path segment of the locator is not a numeric id: {0}")]
    NotNumeric(String),
}

/// Returns the trailing path segment of `locator`, ignoring trailing slashes.
pub fn trailing_segment(locator: &str) -> Option<&str> {
    locator
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|x| !x.is_empty())
}

/// Parses the id encoded in the trailing path segment of `locator`.
pub fn id_from_locator(locator: &str) -> Result<u64, Error> {
    let segment =
        trailing_segment(locator).ok_or_else(|| Error::NoSegment(locator.to_owned()))?;
    segment
        .parse::<u64>()
        .map_err(|_| Error::NotNumeric(locator.to_owned()))
}
