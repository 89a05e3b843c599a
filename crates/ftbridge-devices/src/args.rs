/*!
 * Validation of host-supplied argument lists.
 */
use ftbridge_core::types::Value;

use crate::error::{DeviceError, Result};

/// The argument at `index`, or `MissingArgument` naming it
pub fn required<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a Value> {
    match args.get(index) {
        Some(Value::Null) | None => Err(DeviceError::missing_argument(name)),
        Some(value) => Ok(value),
    }
}

/// A string argument
pub fn expect_str<'a>(value: &'a Value, name: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| DeviceError::wrong_argument_type(name, "string", value.type_name()))
}

/// An unsigned 32-bit integer argument
pub fn expect_u32(value: &Value, name: &str) -> Result<u32> {
    value
        .as_u32()
        .ok_or_else(|| DeviceError::wrong_argument_type(name, "uint32", value.type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_required() {
        let args = [Value::from("A1B2C3"), Value::Null];
        assert_eq!(required(&args, 0, "serialNumber").unwrap(), &args[0]);
        assert_eq!(
            required(&args, 1, "mask").unwrap_err().kind(),
            ErrorKind::MissingArgument
        );
        assert_eq!(
            required(&args, 2, "mask").unwrap_err().kind(),
            ErrorKind::MissingArgument
        );
    }

    #[test]
    fn test_typed_accessors() {
        assert_eq!(expect_str(&Value::from("A1"), "serialNumber").unwrap(), "A1");
        let err = expect_str(&Value::from(12u32), "serialNumber").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongArgumentType);
        assert_eq!(
            err.to_string(),
            "Wrong argument type for serialNumber: expected string, got number"
        );

        assert_eq!(expect_u32(&Value::from(3u32), "mask").unwrap(), 3);
        assert_eq!(
            expect_u32(&Value::from(-1i64), "mask").unwrap_err().kind(),
            ErrorKind::WrongArgumentType
        );
    }
}
