use std::fmt;

use crate::error::PropertyError;

/// A typed message property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl PropertyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "boolean",
            PropertyValue::Byte(_) => "byte",
            PropertyValue::Short(_) => "short",
            PropertyValue::Int(_) => "int",
            PropertyValue::Long(_) => "long",
            PropertyValue::Float(_) => "float",
            PropertyValue::Double(_) => "double",
            PropertyValue::String(_) => "String",
        }
    }

    // Widening only: a narrower integer or float reads as a wider one, never
    // the reverse. Strings are parsed.

    pub fn to_bool(&self, name: &str) -> Result<bool, PropertyError> {
        match self {
            PropertyValue::Bool(b) => Ok(*b),
            PropertyValue::String(s) => Ok(s.eq_ignore_ascii_case("true")),
            other => Err(other.conversion(name, "boolean")),
        }
    }

    pub fn to_byte(&self, name: &str) -> Result<i8, PropertyError> {
        match self {
            PropertyValue::Byte(v) => Ok(*v),
            PropertyValue::String(s) => self.parse(name, s, "byte"),
            other => Err(other.conversion(name, "byte")),
        }
    }

    pub fn to_short(&self, name: &str) -> Result<i16, PropertyError> {
        match self {
            PropertyValue::Byte(v) => Ok(i16::from(*v)),
            PropertyValue::Short(v) => Ok(*v),
            PropertyValue::String(s) => self.parse(name, s, "short"),
            other => Err(other.conversion(name, "short")),
        }
    }

    pub fn to_int(&self, name: &str) -> Result<i32, PropertyError> {
        match self {
            PropertyValue::Byte(v) => Ok(i32::from(*v)),
            PropertyValue::Short(v) => Ok(i32::from(*v)),
            PropertyValue::Int(v) => Ok(*v),
            PropertyValue::String(s) => self.parse(name, s, "int"),
            other => Err(other.conversion(name, "int")),
        }
    }

    pub fn to_long(&self, name: &str) -> Result<i64, PropertyError> {
        match self {
            PropertyValue::Byte(v) => Ok(i64::from(*v)),
            PropertyValue::Short(v) => Ok(i64::from(*v)),
            PropertyValue::Int(v) => Ok(i64::from(*v)),
            PropertyValue::Long(v) => Ok(*v),
            PropertyValue::String(s) => self.parse(name, s, "long"),
            other => Err(other.conversion(name, "long")),
        }
    }

    pub fn to_float(&self, name: &str) -> Result<f32, PropertyError> {
        match self {
            PropertyValue::Float(v) => Ok(*v),
            PropertyValue::String(s) => self.parse(name, s.trim(), "float"),
            other => Err(other.conversion(name, "float")),
        }
    }

    pub fn to_double(&self, name: &str) -> Result<f64, PropertyError> {
        match self {
            PropertyValue::Float(v) => Ok(f64::from(*v)),
            PropertyValue::Double(v) => Ok(*v),
            PropertyValue::String(s) => self.parse(name, s.trim(), "double"),
            other => Err(other.conversion(name, "double")),
        }
    }

    fn parse<T: std::str::FromStr>(
        &self,
        name: &str,
        raw: &str,
        to: &'static str,
    ) -> Result<T, PropertyError> {
        raw.parse().map_err(|_| self.conversion(name, to))
    }

    fn conversion(&self, name: &str, to: &'static str) -> PropertyError {
        PropertyError::Conversion {
            name: name.to_string(),
            from: self.type_name(),
            to,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Byte(v) => write!(f, "{}", v),
            PropertyValue::Short(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Long(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i8> for PropertyValue {
    fn from(v: i8) -> Self {
        PropertyValue::Byte(v)
    }
}

impl From<i16> for PropertyValue {
    fn from(v: i16) -> Self {
        PropertyValue::Short(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Long(v)
    }
}

impl From<f32> for PropertyValue {
    fn from(v: f32) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widening() {
        let v = PropertyValue::Short(12);
        assert_eq!(v.to_int("p").unwrap(), 12);
        assert_eq!(v.to_long("p").unwrap(), 12);
        assert!(v.to_byte("p").is_err());
    }

    #[test]
    fn test_float_reads_as_double_but_not_reverse() {
        assert_eq!(PropertyValue::Float(1.5).to_double("p").unwrap(), 1.5);
        let err = PropertyValue::Double(1.5).to_float("p").unwrap_err();
        assert_eq!(
            err,
            PropertyError::Conversion {
                name: "p".to_string(),
                from: "double",
                to: "float"
            }
        );
    }

    #[test]
    fn test_string_parsing() {
        assert_eq!(PropertyValue::from("42").to_int("p").unwrap(), 42);
        assert_eq!(PropertyValue::from(" 42 ").to_double("p").unwrap(), 42.0);
        assert_eq!(PropertyValue::from("-7").to_byte("p").unwrap(), -7);
        assert!(PropertyValue::from("forty").to_long("p").is_err());
        assert!(PropertyValue::from("TRUE").to_bool("p").unwrap());
        assert!(!PropertyValue::from("yes").to_bool("p").unwrap());
    }

    #[test]
    fn test_integer_strings_reject_surrounding_whitespace() {
        let v = PropertyValue::from(" 42 ");
        assert_eq!(
            v.to_int("p").unwrap_err(),
            PropertyError::Conversion {
                name: "p".to_string(),
                from: "String",
                to: "int"
            }
        );
        assert!(v.to_long("p").is_err());
        assert!(PropertyValue::from("7\n").to_short("p").is_err());
        assert_eq!(v.to_float("p").unwrap(), 42.0);
    }

    #[test]
    fn test_numbers_are_not_booleans() {
        assert!(PropertyValue::Int(1).to_bool("p").is_err());
        assert!(PropertyValue::Bool(true).to_int("p").is_err());
    }
}
