use crate::client::{BufferType, ParamBuffer};
use crate::error::SqlEmulationError;
use crate::rewrite::escape;
use crate::types::{RowValues, SqlType};

/// One positional parameter of a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub value: RowValues,
    /// `None` until the caller declares a type; inference then applies.
    pub declared: Option<SqlType>,
}

impl BoundParam {
    #[must_use]
    pub fn new(value: RowValues, declared: Option<SqlType>) -> Self {
        Self { value, declared }
    }

    #[must_use]
    pub fn unbound() -> Self {
        Self::new(RowValues::Null, None)
    }

    /// Upper bound on the bytes this parameter adds when substituted.
    pub(crate) fn rewrite_width(&self) -> usize {
        self.value.to_text().map_or(4, |text| 2 * text.len() + 3)
    }

    /// Binary-protocol buffer mirroring the value.
    #[must_use]
    pub fn to_buffer(&self) -> ParamBuffer {
        if self.value.is_null() {
            return ParamBuffer::null();
        }
        match (self.declared, &self.value) {
            (Some(ty), value) => declared_buffer(ty, value),
            (None, RowValues::Int(v)) => fixed(BufferType::LongLong, v.to_le_bytes()),
            (None, RowValues::Float(v)) => fixed(BufferType::Double, v.to_le_bytes()),
            (None, RowValues::Bool(v)) => fixed(BufferType::Long, i64::from(*v).to_le_bytes()),
            (None, RowValues::Blob(bytes)) => ParamBuffer {
                buffer_type: BufferType::Blob,
                data: bytes.clone(),
                is_null: false,
            },
            (None, value) => string_buffer(value),
        }
    }
}

fn declared_buffer(ty: SqlType, value: &RowValues) -> ParamBuffer {
    let as_text = || value.to_text().and_then(|t| std::str::from_utf8(&t).ok().map(|s| s.trim().to_string()));
    match ty {
        SqlType::Numeric | SqlType::Integer | SqlType::SmallInt | SqlType::BigInt | SqlType::TinyInt => {
            let parsed = match value {
                RowValues::Int(v) => Some(*v),
                RowValues::Bool(v) => Some(i64::from(*v)),
                _ => as_text().and_then(|s| s.parse::<i64>().ok()),
            };
            parsed.map_or_else(|| string_buffer(value), |v| fixed(BufferType::Long, v.to_le_bytes()))
        }
        SqlType::Double | SqlType::Decimal | SqlType::Float | SqlType::Real => {
            let parsed = match value {
                RowValues::Float(v) => Some(*v),
                #[allow(clippy::cast_precision_loss)]
                RowValues::Int(v) => Some(*v as f64),
                _ => as_text().and_then(|s| s.parse::<f64>().ok()),
            };
            parsed.map_or_else(|| string_buffer(value), |v| fixed(BufferType::Double, v.to_le_bytes()))
        }
        SqlType::Binary | SqlType::VarBinary | SqlType::LongVarBinary => ParamBuffer {
            buffer_type: BufferType::Blob,
            data: value.to_text().map(|t| t.into_owned()).unwrap_or_default(),
            is_null: false,
        },
        _ => string_buffer(value),
    }
}

fn fixed(buffer_type: BufferType, bytes: [u8; 8]) -> ParamBuffer {
    ParamBuffer {
        buffer_type,
        data: bytes.to_vec(),
        is_null: false,
    }
}

fn string_buffer(value: &RowValues) -> ParamBuffer {
    ParamBuffer {
        buffer_type: BufferType::String,
        data: value.to_text().map(|t| t.into_owned()).unwrap_or_default(),
        is_null: false,
    }
}

/// Result of a successful bind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindReport {
    /// Set when a non-numeric value was bound with a numeric type.
    pub warning: Option<String>,
}

/// Per-statement parameter array, sized to the placeholder count.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    params: Vec<BoundParam>,
    buffers: Vec<ParamBuffer>,
    has_been_bound: bool,
}

impl ParamStore {
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            params: vec![BoundParam::unbound(); count],
            buffers: vec![ParamBuffer::null(); count],
            has_been_bound: false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Replace the value at 1-based `position`.
    ///
    /// # Errors
    /// Returns `SqlEmulationError::IllegalParam` when `position` is outside
    /// `1..=len`.
    pub fn bind(
        &mut self,
        position: usize,
        value: RowValues,
        declared: Option<SqlType>,
    ) -> Result<BindReport, SqlEmulationError> {
        if position == 0 || position > self.params.len() {
            return Err(SqlEmulationError::IllegalParam { position });
        }
        let idx = position - 1;

        let mut report = BindReport::default();
        if let Some(ty) = declared
            && ty.is_numeric()
            && !value.is_null()
            && !value.has_numeric_storage()
            && !value
                .to_text()
                .is_some_and(|t| crate::rewrite::looks_numeric(t.trim_ascii()))
        {
            let shown = value
                .to_text()
                .map(|t| String::from_utf8_lossy(&escape::escape_string(&t)).into_owned())
                .unwrap_or_default();
            report.warning = Some(format!(
                "Binding non-numeric field {position}, value '{shown}' as a numeric!"
            ));
        }

        let param = BoundParam::new(value, declared);
        self.buffers[idx] = param.to_buffer();
        self.params[idx] = param;
        self.has_been_bound = false;
        Ok(report)
    }

    #[must_use]
    pub fn params(&self) -> &[BoundParam] {
        &self.params
    }

    #[must_use]
    pub fn buffers(&self) -> &[ParamBuffer] {
        &self.buffers
    }

    /// Whether the native buffers changed since the last bind to the server.
    #[must_use]
    pub fn needs_bind(&self) -> bool {
        !self.has_been_bound
    }

    pub fn mark_bound(&mut self) {
        self.has_been_bound = true;
    }

    /// Force a rebind, e.g. after the statement was prepared again.
    pub fn invalidate(&mut self) {
        self.has_been_bound = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_positions() {
        let mut store = ParamStore::new(2);
        assert!(matches!(
            store.bind(0, RowValues::Int(1), None),
            Err(SqlEmulationError::IllegalParam { position: 0 })
        ));
        assert!(matches!(
            store.bind(3, RowValues::Int(1), None),
            Err(SqlEmulationError::IllegalParam { position: 3 })
        ));
        assert!(store.bind(2, RowValues::Int(1), None).is_ok());
    }

    #[test]
    fn rebind_replaces_value_and_dirties_store() {
        let mut store = ParamStore::new(1);
        store.bind(1, RowValues::Text("a".into()), None).expect("bind");
        assert!(store.needs_bind());
        store.mark_bound();
        assert!(!store.needs_bind());
        store.bind(1, RowValues::Text("b".into()), None).expect("rebind");
        assert!(store.needs_bind());
        assert_eq!(store.params()[0].value, RowValues::Text("b".into()));
    }

    #[test]
    fn non_numeric_value_bound_as_numeric_warns() {
        let mut store = ParamStore::new(1);
        let report = store
            .bind(1, RowValues::Text("abc".into()), Some(SqlType::Integer))
            .expect("bind continues");
        assert!(report.warning.is_some());
        assert_eq!(store.buffers()[0].buffer_type, BufferType::String);

        let report = store
            .bind(1, RowValues::Text(" 42 ".into()), Some(SqlType::Integer))
            .expect("bind");
        assert!(report.warning.is_none());
        assert_eq!(store.buffers()[0].buffer_type, BufferType::Long);
        assert_eq!(store.buffers()[0].data, 42i64.to_le_bytes().to_vec());
    }

    #[test]
    fn buffer_types_follow_declared_type() {
        let cases = [
            (RowValues::Int(3), Some(SqlType::TinyInt), BufferType::Long),
            (RowValues::Text("2.5".into()), Some(SqlType::Decimal), BufferType::Double),
            (RowValues::Int(3), Some(SqlType::Varchar), BufferType::String),
            (RowValues::Int(3), None, BufferType::LongLong),
            (RowValues::Float(0.5), None, BufferType::Double),
            (RowValues::Blob(vec![1, 2]), None, BufferType::Blob),
            (RowValues::Null, Some(SqlType::Integer), BufferType::Null),
        ];
        for (value, declared, expected) in cases {
            let buffer = BoundParam::new(value.clone(), declared).to_buffer();
            assert_eq!(buffer.buffer_type, expected, "{value:?} as {declared:?}");
        }
    }
}
