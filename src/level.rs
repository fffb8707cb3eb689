/// Severity attached to a record by the logging facility.
///
/// The TCP backend never filters or re-renders on this value; it is carried
/// through the plugin contract so other backends can use it. Numeric values
/// follow the syslog ordering used by embedded loggers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum FemtoLevel {
    Assert = 0,
    Error = 3,
    Warn = 4,
    #[default]
    Info = 6,
    Debug = 7,
}
