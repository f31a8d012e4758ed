//! Persisted pointer to an object-store location
//!
//! A video record stores its uploaded file as a `"<bucket>,<key>"` composite
//! string. The textual form is the durable-storage contract; everywhere else
//! the locator is the structured [`VideoLocator`] value.

use thiserror::Error;

/// Separator between bucket and key in the persisted form.
const SEPARATOR: char = ',';

/// Errors from encoding or decoding a video locator
#[derive(Error, Debug)]
pub enum LocatorError {
    /// A bucket or key containing the separator would not round-trip
    #[error("locator field contains a reserved ',' character: {0}")]
    ReservedSeparator(String),

    /// The persisted string does not split into exactly bucket and key
    #[error("malformed video locator: {0}")]
    Malformed(String),
}

/// Object-store location of an uploaded video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLocator {
    bucket: String,
    key: String,
}

impl VideoLocator {
    /// Build a locator, rejecting fields that cannot round-trip through the
    /// persisted form.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Result<Self, LocatorError> {
        let bucket = bucket.into();
        let key = key.into();

        for field in [&bucket, &key] {
            if field.contains(SEPARATOR) {
                return Err(LocatorError::ReservedSeparator(field.clone()));
            }
        }

        Ok(Self { bucket, key })
    }

    /// Serialize to the persisted `"<bucket>,<key>"` form
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.bucket, SEPARATOR, self.key)
    }

    /// Parse the persisted form; fails unless it splits into exactly two parts
    pub fn decode(raw: &str) -> Result<Self, LocatorError> {
        let parts: Vec<&str> = raw.split(SEPARATOR).collect();
        match parts.as_slice() {
            [bucket, key] => Ok(Self {
                bucket: (*bucket).to_string(),
                key: (*key).to_string(),
            }),
            _ => Err(LocatorError::Malformed(raw.to_string())),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let locator = VideoLocator::new("clips", "landscape/abc123.mp4").unwrap();
        let decoded = VideoLocator::decode(&locator.encode()).unwrap();
        assert_eq!(decoded, locator);
        assert_eq!(decoded.bucket(), "clips");
        assert_eq!(decoded.key(), "landscape/abc123.mp4");
    }

    #[test]
    fn test_encoded_form() {
        let locator = VideoLocator::new("clips", "other/vid.mp4").unwrap();
        assert_eq!(locator.encode(), "clips,other/vid.mp4");
    }

    #[test]
    fn test_decode_without_separator_fails() {
        assert!(matches!(
            VideoLocator::decode("no-separator-here"),
            Err(LocatorError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_with_extra_separators_fails() {
        assert!(matches!(
            VideoLocator::decode("bucket,key,extra"),
            Err(LocatorError::Malformed(_))
        ));
        assert!(matches!(
            VideoLocator::decode("a,b,c,d"),
            Err(LocatorError::Malformed(_))
        ));
    }

    #[test]
    fn test_reserved_separator_rejected() {
        assert!(matches!(
            VideoLocator::new("bucket,with,commas", "key"),
            Err(LocatorError::ReservedSeparator(_))
        ));
        assert!(matches!(
            VideoLocator::new("bucket", "key,with,commas"),
            Err(LocatorError::ReservedSeparator(_))
        ));
    }
}
