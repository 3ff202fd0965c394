//! Primitive datatypes a flag or field value may carry

use crate::Error;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The fixed set of `as-type` keywords understood by the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Datatype {
    Boolean,
    Empty,
    #[default]
    String,
    Mixed,
    MarkupLine,
    MarkupMultiline,
    Date,
    DateTime,
    DateWithTimezone,
    DateTimeWithTimezone,
    NcName,
    Token,
    Email,
    Uri,
    UriReference,
    AnyUri,
    Base64,
    IdRef,
    NmToken,
    Id,
    Uuid,
    Integer,
    NonNegativeInteger,
    PositiveInteger,
    Decimal,
}

impl Datatype {
    /// Every datatype, in declaration order
    pub const ALL: [Datatype; 25] = [
        Datatype::Boolean,
        Datatype::Empty,
        Datatype::String,
        Datatype::Mixed,
        Datatype::MarkupLine,
        Datatype::MarkupMultiline,
        Datatype::Date,
        Datatype::DateTime,
        Datatype::DateWithTimezone,
        Datatype::DateTimeWithTimezone,
        Datatype::NcName,
        Datatype::Token,
        Datatype::Email,
        Datatype::Uri,
        Datatype::UriReference,
        Datatype::AnyUri,
        Datatype::Base64,
        Datatype::IdRef,
        Datatype::NmToken,
        Datatype::Id,
        Datatype::Uuid,
        Datatype::Integer,
        Datatype::NonNegativeInteger,
        Datatype::PositiveInteger,
        Datatype::Decimal,
    ];

    /// The keyword as it appears in `@as-type`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Datatype::Boolean => "boolean",
            Datatype::Empty => "empty",
            Datatype::String => "string",
            Datatype::Mixed => "mixed",
            Datatype::MarkupLine => "markup-line",
            Datatype::MarkupMultiline => "markup-multiline",
            Datatype::Date => "date",
            Datatype::DateTime => "dateTime",
            Datatype::DateWithTimezone => "date-with-timezone",
            Datatype::DateTimeWithTimezone => "dateTime-with-timezone",
            Datatype::NcName => "NCName",
            Datatype::Token => "token",
            Datatype::Email => "email",
            Datatype::Uri => "uri",
            Datatype::UriReference => "uri-reference",
            Datatype::AnyUri => "anyURI",
            Datatype::Base64 => "base64Binary",
            Datatype::IdRef => "IDREF",
            Datatype::NmToken => "NMTOKEN",
            Datatype::Id => "ID",
            Datatype::Uuid => "uuid",
            Datatype::Integer => "integer",
            Datatype::NonNegativeInteger => "nonNegativeInteger",
            Datatype::PositiveInteger => "positiveInteger",
            Datatype::Decimal => "decimal",
        }
    }

    /// Markup-bearing values carry rich text rather than a plain scalar
    #[must_use]
    pub fn is_markup(self) -> bool {
        matches!(self, Datatype::MarkupLine | Datatype::MarkupMultiline)
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Datatype::Integer
                | Datatype::NonNegativeInteger
                | Datatype::PositiveInteger
                | Datatype::Decimal
        )
    }
}

impl FromStr for Datatype {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Datatype::ALL
            .into_iter()
            .find(|dt| dt.as_str() == s)
            .ok_or_else(|| Error::UnknownDatatype(s.to_string()))
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_round_trip_through_from_str() {
        for dt in Datatype::ALL {
            assert_eq!(dt.as_str().parse::<Datatype>().unwrap(), dt);
        }
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!("NCName".parse::<Datatype>().unwrap(), Datatype::NcName);
        assert!("ncname".parse::<Datatype>().is_err());
    }

    #[test]
    fn test_unknown_keyword() {
        match "float".parse::<Datatype>() {
            Err(Error::UnknownDatatype(v)) => assert_eq!(v, "float"),
            other => panic!("Expected UnknownDatatype, got {:?}", other),
        }
    }

    #[test]
    fn test_markup_and_numeric_classification() {
        assert!(Datatype::MarkupLine.is_markup());
        assert!(Datatype::MarkupMultiline.is_markup());
        assert!(!Datatype::String.is_markup());
        assert!(Datatype::NonNegativeInteger.is_numeric());
        assert!(!Datatype::Uuid.is_numeric());
    }

    #[test]
    fn test_default_is_string() {
        assert_eq!(Datatype::default(), Datatype::String);
    }
}
