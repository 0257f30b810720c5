//! Static native-type catalog.
//!
//! Maps every server column/parameter type code to a portable descriptor. The
//! table is read-only and shared by all connections.

use serde::{Deserialize, Serialize};

use crate::client::BufferType;
use crate::types::SqlType;
use NativeType as N;
use SqlType as S;

/// Column and parameter type codes used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeType {
    Decimal,
    Tiny,
    Short,
    Long,
    Float,
    Double,
    Null,
    Timestamp,
    LongLong,
    Int24,
    Date,
    Time,
    DateTime,
    Year,
    NewDate,
    Varchar,
    Bit,
    NewDecimal,
    Enum,
    Set,
    TinyBlob,
    MediumBlob,
    LongBlob,
    Blob,
    VarString,
    String,
    Geometry,
}

impl NativeType {
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            NativeType::Decimal => 0,
            NativeType::Tiny => 1,
            NativeType::Short => 2,
            NativeType::Long => 3,
            NativeType::Float => 4,
            NativeType::Double => 5,
            NativeType::Null => 6,
            NativeType::Timestamp => 7,
            NativeType::LongLong => 8,
            NativeType::Int24 => 9,
            NativeType::Date => 10,
            NativeType::Time => 11,
            NativeType::DateTime => 12,
            NativeType::Year => 13,
            NativeType::NewDate => 14,
            NativeType::Varchar => 15,
            NativeType::Bit => 16,
            NativeType::NewDecimal => 246,
            NativeType::Enum => 247,
            NativeType::Set => 248,
            NativeType::TinyBlob => 249,
            NativeType::MediumBlob => 250,
            NativeType::LongBlob => 251,
            NativeType::Blob => 252,
            NativeType::VarString => 253,
            NativeType::String => 254,
            NativeType::Geometry => 255,
        }
    }

    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        let ty = match code {
            0 => NativeType::Decimal,
            1 => NativeType::Tiny,
            2 => NativeType::Short,
            3 => NativeType::Long,
            4 => NativeType::Float,
            5 => NativeType::Double,
            6 => NativeType::Null,
            7 => NativeType::Timestamp,
            8 => NativeType::LongLong,
            9 => NativeType::Int24,
            10 => NativeType::Date,
            11 => NativeType::Time,
            12 => NativeType::DateTime,
            13 => NativeType::Year,
            14 => NativeType::NewDate,
            15 => NativeType::Varchar,
            16 => NativeType::Bit,
            246 => NativeType::NewDecimal,
            247 => NativeType::Enum,
            248 => NativeType::Set,
            249 => NativeType::TinyBlob,
            250 => NativeType::MediumBlob,
            251 => NativeType::LongBlob,
            252 => NativeType::Blob,
            253 => NativeType::VarString,
            254 => NativeType::String,
            255 => NativeType::Geometry,
            _ => return None,
        };
        Some(ty)
    }

    #[must_use]
    pub fn is_blob(self) -> bool {
        matches!(
            self,
            NativeType::TinyBlob
                | NativeType::MediumBlob
                | NativeType::LongBlob
                | NativeType::Blob
                | NativeType::Geometry
        )
    }
}

/// One row of the type catalog, laid out like an ODBC `SQLGetTypeInfo` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    pub type_name: &'static str,
    pub data_type: SqlType,
    pub column_size: u32,
    pub literal_prefix: Option<&'static str>,
    pub literal_suffix: Option<&'static str>,
    pub create_params: Option<&'static str>,
    pub nullable: bool,
    pub case_sensitive: bool,
    /// 0 = unsearchable, 1 = LIKE only, 3 = fully searchable.
    pub searchable: u8,
    pub unsigned_attribute: bool,
    pub fixed_prec_scale: bool,
    pub auto_unique_value: bool,
    pub local_type_name: &'static str,
    pub minimum_scale: i16,
    pub maximum_scale: i16,
    pub num_prec_radix: u8,
    /// Raw ODBC datatype column; `0` for enum and set.
    pub sql_datatype: i16,
    pub sql_datetime_sub: i16,
    pub interval_precision: i16,
    pub native_type: NativeType,
    pub is_num: bool,
}

const Q: Option<&str> = Some("'");

#[allow(clippy::too_many_arguments)]
const fn row(
    type_name: &'static str,
    data_type: SqlType,
    column_size: u32,
    quote: (Option<&'static str>, Option<&'static str>),
    create_params: Option<&'static str>,
    nullable: bool,
    searchable: u8,
    unsigned_attribute: bool,
    auto_unique_value: bool,
    local_type_name: &'static str,
    scale: (i16, i16),
    num_prec_radix: u8,
    sql_datatype: i16,
    native_type: NativeType,
    is_num: bool,
) -> TypeDescriptor {
    TypeDescriptor {
        type_name,
        data_type,
        column_size,
        literal_prefix: quote.0,
        literal_suffix: quote.1,
        create_params,
        nullable,
        case_sensitive: false,
        searchable,
        unsigned_attribute,
        fixed_prec_scale: false,
        auto_unique_value,
        local_type_name,
        minimum_scale: scale.0,
        maximum_scale: scale.1,
        num_prec_radix,
        sql_datatype,
        sql_datetime_sub: 0,
        interval_precision: 0,
        native_type,
        is_num,
    }
}

// The first 23 rows are addressed positionally by `lookup`; keep their order.
#[rustfmt::skip]
static TYPE_INFO: [TypeDescriptor; 55] = [
    row("varchar", S::Varchar, 255, (Q, Q), Some("max length"), true, 3, false, false,
        "variable length string", (0, 0), 0, 12, N::VarString, false),
    row("decimal", S::Decimal, 15, (None, None), Some("precision,scale"), true, 3, false, false,
        "double", (0, 6), 2, 3, N::Decimal, true),
    row("tinyint", S::TinyInt, 3, (None, None), None, true, 3, false, false,
        "Tiny integer", (0, 0), 10, -6, N::Tiny, true),
    row("smallint", S::SmallInt, 5, (None, None), None, true, 3, false, false,
        "Short integer", (0, 0), 10, 5, N::Short, true),
    row("integer", S::Integer, 10, (None, None), None, true, 3, false, false,
        "integer", (0, 0), 10, 4, N::Long, true),
    row("float", S::Real, 7, (None, None), None, true, 0, false, false,
        "float", (0, 2), 10, 6, N::Float, true),
    row("double", S::Float, 15, (None, None), None, true, 3, false, false,
        "double", (0, 4), 2, 6, N::Double, true),
    row("double", S::Double, 15, (None, None), None, true, 3, false, false,
        "double", (0, 4), 10, 8, N::Double, true),
    row("timestamp", S::Timestamp, 14, (Q, Q), None, false, 3, false, false,
        "timestamp", (0, 0), 0, 11, N::Timestamp, false),
    row("bigint", S::BigInt, 19, (None, None), None, true, 3, false, false,
        "Longlong integer", (0, 0), 10, -5, N::LongLong, true),
    row("middleint", S::Integer, 8, (None, None), None, true, 3, false, false,
        "Medium integer", (0, 0), 10, 4, N::Int24, true),
    row("date", S::Date, 10, (Q, Q), None, true, 3, false, false,
        "date", (0, 0), 0, 9, N::Date, false),
    row("time", S::Time, 6, (Q, Q), None, true, 3, false, false,
        "time", (0, 0), 0, 10, N::Time, false),
    row("datetime", S::Timestamp, 21, (Q, Q), None, true, 3, false, false,
        "datetime", (0, 0), 0, 11, N::DateTime, false),
    row("year", S::SmallInt, 4, (None, None), None, true, 3, false, false,
        "year", (0, 0), 10, 5, N::Year, false),
    row("date", S::Date, 10, (Q, Q), None, true, 3, false, false,
        "date", (0, 0), 0, 9, N::NewDate, false),
    row("enum", S::Varchar, 255, (Q, Q), None, true, 1, false, false,
        "enum(value1,value2,value3...)", (0, 0), 0, 0, N::Enum, false),
    row("set", S::Varchar, 255, (Q, Q), None, true, 1, false, false,
        "set(value1,value2,value3...)", (0, 0), 0, 0, N::Set, false),
    row("blob", S::LongVarBinary, 65535, (Q, Q), None, true, 3, false, false,
        "binary large object (0-65535)", (0, 0), 0, -4, N::Blob, false),
    row("tinyblob", S::VarBinary, 255, (Q, Q), None, true, 3, false, false,
        "binary large object (0-255) ", (0, 0), 0, -3, N::TinyBlob, false),
    row("mediumblob", S::LongVarBinary, 16_777_215, (Q, Q), None, true, 3, false, false,
        "binary large object", (0, 0), 0, -4, N::MediumBlob, false),
    row("longblob", S::LongVarBinary, 2_147_483_647, (Q, Q), None, true, 3, false, false,
        "binary large object, use mediumblob instead", (0, 0), 0, -4, N::LongBlob, false),
    row("char", S::Char, 255, (Q, Q), Some("max length"), true, 3, false, false,
        "string", (0, 0), 0, 1, N::String, false),
    row("decimal", S::Numeric, 15, (None, None), Some("precision,scale"), true, 3, false, false,
        "double", (0, 6), 2, 2, N::Decimal, true),
    row("tinyint unsigned", S::TinyInt, 3, (None, None), None, true, 3, true, false,
        "Tiny integer unsigned", (0, 0), 10, -6, N::Tiny, true),
    row("smallint unsigned", S::SmallInt, 5, (None, None), None, true, 3, true, false,
        "Short integer unsigned", (0, 0), 10, 5, N::Short, true),
    row("middleint unsigned", S::Integer, 8, (None, None), None, true, 3, true, false,
        "Medium integer unsigned", (0, 0), 10, 4, N::Int24, true),
    row("int unsigned", S::Integer, 10, (None, None), None, true, 3, true, false,
        "integer unsigned", (0, 0), 10, 4, N::Long, true),
    row("int", S::Integer, 10, (None, None), None, true, 3, false, false,
        "integer", (0, 0), 10, 4, N::Long, true),
    row("integer unsigned", S::Integer, 10, (None, None), None, true, 3, true, false,
        "integer", (0, 0), 10, 4, N::Long, true),
    row("bigint unsigned", S::BigInt, 20, (None, None), None, true, 3, true, false,
        "Longlong integer unsigned", (0, 0), 10, -5, N::LongLong, true),
    row("text", S::LongVarchar, 65535, (Q, Q), None, true, 3, false, false,
        "large text object (0-65535)", (0, 0), 0, -1, N::Blob, false),
    row("mediumtext", S::LongVarchar, 16_777_215, (Q, Q), None, true, 3, false, false,
        "large text object", (0, 0), 0, -1, N::MediumBlob, false),
    row("mediumint unsigned auto_increment", S::Integer, 8, (None, None), None, false, 3, true, true,
        "Medium integer unsigned auto_increment", (0, 0), 10, 4, N::Int24, true),
    row("tinyint unsigned auto_increment", S::TinyInt, 3, (None, None), None, false, 3, true, true,
        "tinyint unsigned auto_increment", (0, 0), 10, -6, N::Tiny, true),
    row("smallint auto_increment", S::SmallInt, 5, (None, None), None, false, 3, false, true,
        "smallint auto_increment", (0, 0), 10, 5, N::Short, true),
    row("int unsigned auto_increment", S::Integer, 10, (None, None), None, false, 3, true, true,
        "integer unsigned auto_increment", (0, 0), 10, 4, N::Long, true),
    row("mediumint", S::Integer, 7, (None, None), None, true, 3, false, false,
        "Medium integer", (0, 0), 10, 4, N::Int24, true),
    row("bit", S::Bit, 1, (None, None), None, true, 3, false, false,
        "char(1)", (0, 0), 0, -7, N::Tiny, false),
    row("numeric", S::Numeric, 19, (None, None), Some("precision,scale"), true, 3, false, false,
        "numeric", (0, 19), 10, 2, N::Decimal, true),
    row("integer unsigned auto_increment", S::Integer, 10, (None, None), None, false, 3, true, true,
        "integer unsigned auto_increment", (0, 0), 10, 4, N::Long, true),
    row("mediumint unsigned", S::Integer, 8, (None, None), None, true, 3, true, false,
        "Medium integer unsigned", (0, 0), 10, 4, N::Int24, true),
    row("smallint unsigned auto_increment", S::SmallInt, 5, (None, None), None, false, 3, true, true,
        "smallint unsigned auto_increment", (0, 0), 10, 5, N::Short, true),
    row("int auto_increment", S::Integer, 10, (None, None), None, false, 3, false, true,
        "integer auto_increment", (0, 0), 10, 4, N::Long, true),
    row("long varbinary", S::LongVarBinary, 16_777_215, (Some("0x"), None), None, true, 3, false, false,
        "mediumblob", (0, 0), 0, -4, N::LongBlob, false),
    row("double auto_increment", S::Float, 15, (None, None), None, false, 3, false, true,
        "double auto_increment", (0, 4), 2, 6, N::Double, true),
    row("double auto_increment", S::Double, 15, (None, None), None, false, 3, false, true,
        "double auto_increment", (0, 4), 10, 8, N::Double, true),
    row("integer auto_increment", S::Integer, 10, (None, None), None, false, 3, false, true,
        "integer auto_increment", (0, 0), 10, 4, N::Long, true),
    row("bigint auto_increment", S::BigInt, 19, (None, None), None, false, 3, false, true,
        "bigint auto_increment", (0, 0), 10, -5, N::LongLong, true),
    row("bit auto_increment", S::Bit, 1, (None, None), None, false, 3, false, true,
        "char(1) auto_increment", (0, 0), 0, -7, N::Tiny, true),
    row("mediumint auto_increment", S::Integer, 7, (None, None), None, false, 3, false, true,
        "Medium integer auto_increment", (0, 0), 10, 4, N::Int24, true),
    row("float auto_increment", S::Real, 7, (None, None), None, false, 0, false, true,
        "float auto_increment", (0, 2), 10, 6, N::Float, true),
    row("long varchar", S::LongVarchar, 16_777_215, (Q, Q), None, true, 3, false, false,
        "mediumtext", (0, 0), 0, -1, N::MediumBlob, true),
    row("tinyint auto_increment", S::TinyInt, 3, (None, None), None, false, 3, false, true,
        "tinyint auto_increment", (0, 0), 10, -6, N::Tiny, true),
    row("bigint unsigned auto_increment", S::BigInt, 20, (None, None), None, false, 3, true, true,
        "bigint unsigned auto_increment", (0, 0), 10, -5, N::LongLong, true),
];

/// Descriptor for a native type. Total: types without a dedicated row fall
/// back to the generic `varchar` descriptor.
#[must_use]
pub fn lookup(native: NativeType) -> &'static TypeDescriptor {
    let idx = match native {
        NativeType::VarString => 0,
        NativeType::Decimal | NativeType::NewDecimal => 1,
        NativeType::Tiny => 2,
        NativeType::Short => 3,
        NativeType::Long => 4,
        NativeType::Float => 5,
        // Row 6 is the SQL_FLOAT spelling of double; round trips use SQL_DOUBLE.
        NativeType::Double => 7,
        NativeType::Timestamp => 8,
        NativeType::LongLong => 9,
        NativeType::Int24 => 10,
        NativeType::Date => 11,
        NativeType::Time => 12,
        NativeType::DateTime => 13,
        NativeType::Year => 14,
        NativeType::NewDate => 15,
        NativeType::Enum => 16,
        NativeType::Set => 17,
        NativeType::Blob => 18,
        NativeType::TinyBlob => 19,
        NativeType::MediumBlob => 20,
        NativeType::LongBlob => 21,
        NativeType::String => 22,
        NativeType::Null | NativeType::Varchar | NativeType::Bit | NativeType::Geometry => 0,
    };
    &TYPE_INFO[idx]
}

/// Descriptor for a raw wire code; unknown codes get the `varchar` row.
#[must_use]
pub fn lookup_code(code: u16) -> &'static TypeDescriptor {
    NativeType::from_code(code).map_or(&TYPE_INFO[0], lookup)
}

/// Every catalog row in order, as exposed by `type_info_all`.
pub fn type_info_all() -> impl Iterator<Item = &'static TypeDescriptor> {
    TYPE_INFO.iter()
}

/// First descriptor whose portable type matches `sql_type`.
#[must_use]
pub fn descriptor_for_sql_type(sql_type: SqlType) -> Option<&'static TypeDescriptor> {
    type_info_all().find(|d| d.data_type == sql_type)
}

/// Receive-buffer type for a native result column.
#[must_use]
pub fn buffer_type_for(native: NativeType) -> BufferType {
    match native {
        NativeType::Double | NativeType::Float => BufferType::Double,
        NativeType::Short
        | NativeType::Tiny
        | NativeType::Long
        | NativeType::Int24
        | NativeType::Year => BufferType::Long,
        NativeType::LongLong => BufferType::LongLong,
        n if n.is_blob() => BufferType::Blob,
        _ => BufferType::String,
    }
}
