// filter value constants
pub const ANY_VALUE: &str = "*";
pub const DATETIME_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(:\d{2})?$";
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
pub const DATETIME_MINUTES_FORMAT: &str = "%Y-%m-%dT%H:%M";

// key syntax constants
pub const SCHEMA_SEPARATOR: char = '|';
pub const SCHEMA_VERSION_SEPARATOR: char = ':';
pub const PATH_SEPARATOR: char = '.';

// document constants
pub const DOC_ID: &str = "_id";
pub const DOC_KEY: &str = "_key";
pub const DOC_REV: &str = "_rev";
pub const DEFAULT_TYPE_KEY: &str = "type";
pub const DEFAULT_SORT_KEY: &str = "date_created";
pub const DEFAULT_SCHEMA_TYPE_KEY: &str = "schema.type";
pub const DEFAULT_SCHEMA_VERSION_KEY: &str = "schema.version";
pub const DEFAULT_LABEL_KEY: &str = "title";
pub const DEFAULT_LIMIT: u64 = 20;

// object list constants
pub const METADATA_LIST: &str = "metadata";
pub const METADATA_DISCRIMINATOR: &str = "key";
pub const METADATA_LEAF: &str = "value";
pub const RELATIONS_LIST: &str = "relations";
pub const RELATIONS_DISCRIMINATOR: &str = "type";
pub const RELATIONS_LEAF: &str = "key";
pub const ANY_COLLECTION: &str = "*";

// storage key escaping
pub const ESCAPED_DOT: char = '\u{FF0E}';
pub const ESCAPED_DOLLAR: char = '\u{FF04}';

// option constants
pub const OPTION_LABEL: &str = "label";
pub const OPTION_VALUE: &str = "value";

// engine names
pub const MONGO_ENGINE: &str = "mongo";
pub const ARANGO_ENGINE: &str = "arango";
pub const MEMORY_ENGINE: &str = "memory";
