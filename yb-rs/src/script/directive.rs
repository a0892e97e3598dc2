//! Classified script lines.

use std::fmt;

/// The meaning of one cleaned script line.
///
/// | Line                        | Directive                 |
/// |-----------------------------|---------------------------|
/// | `properties <name>=<value>` | [`Directive::PropertyAssignment`] |
/// | `saveTo <path>`             | [`Directive::SaveTo`]     |
/// | `useAsInput <path>`         | [`Directive::UseAsInput`] |
/// | `batch <path>`              | [`Directive::SubBatch`]   |
/// | `foreach`                   | [`Directive::ForEachBegin`] |
/// | `end`                       | [`Directive::ForEachEnd`] |
/// | anything else               | [`Directive::PlainCommand`] |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    PropertyAssignment { key: String, value: String },
    SaveTo { path: String },
    UseAsInput { path: String },
    SubBatch { path: String },
    ForEachBegin,
    ForEachEnd,
    /// First whitespace-delimited token of the line.
    PlainCommand { name: String },
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::PropertyAssignment { key, value } => {
                write!(f, "PropertyAssignment[{key}={value}]")
            }
            Directive::SaveTo { path } => write!(f, "SaveTo[{path}]"),
            Directive::UseAsInput { path } => write!(f, "UseAsInput[{path}]"),
            Directive::SubBatch { path } => write!(f, "SubBatch[{path}]"),
            Directive::ForEachBegin => f.write_str("ForEachBegin"),
            Directive::ForEachEnd => f.write_str("ForEachEnd"),
            Directive::PlainCommand { name } => write!(f, "Command[{name}]"),
        }
    }
}
