//! Binding sea-query values as `may_postgres` parameters.

use may_postgres::types::ToSql;
use sea_query::{Value, Values};

use crate::executor::ExecError;

/// Convert `values` to owned parameters and run `f` with borrowed views of
/// them. The references handed to `f` are only valid inside the closure.
pub fn with_converted_params<F, R>(values: &Values, f: F) -> Result<R, ExecError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, ExecError>,
{
    let owned = values
        .iter()
        .map(owned_param)
        .collect::<Result<Vec<Box<dyn ToSql>>, ExecError>>()?;
    let params: Vec<&dyn ToSql> = owned.iter().map(|p| p.as_ref()).collect();
    f(&params)
}

fn owned_param(value: &Value) -> Result<Box<dyn ToSql>, ExecError> {
    let param: Box<dyn ToSql> = match value {
        Value::Bool(v) => Box::new(*v),
        Value::TinyInt(v) => Box::new(v.map(i32::from)),
        Value::SmallInt(v) => Box::new(v.map(i32::from)),
        Value::Int(v) => Box::new(*v),
        Value::BigInt(v) => Box::new(*v),
        Value::TinyUnsigned(v) => Box::new(v.map(i32::from)),
        Value::SmallUnsigned(v) => Box::new(v.map(i32::from)),
        Value::Unsigned(v) => Box::new(v.map(i64::from)),
        Value::BigUnsigned(v) => {
            let converted = match v {
                Some(u) => Some(i64::try_from(*u).map_err(|_| {
                    ExecError::Query(format!("value {} exceeds i64::MAX", u))
                })?),
                None => None,
            };
            Box::new(converted)
        }
        Value::Float(v) => Box::new(*v),
        Value::Double(v) => Box::new(*v),
        Value::String(v) => Box::new(v.clone()),
        _ => {
            return Err(ExecError::Query(format!(
                "Unsupported value type in query: {:?}",
                value
            )))
        }
    };
    Ok(param)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_list_parameters() {
        let values = Values(vec![
            Value::String(Some("%ram%".to_string())),
            Value::BigUnsigned(Some(10)),
            Value::BigUnsigned(Some(20)),
        ]);
        let count = with_converted_params(&values, |params| Ok(params.len())).unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_rejects_out_of_range_unsigned() {
        let values = Values(vec![Value::BigUnsigned(Some(u64::MAX))]);
        let err = with_converted_params(&values, |_| Ok(())).unwrap_err();
        assert!(matches!(err, ExecError::Query(_)));
    }
}
