#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    TooManyStations { stations: u32, max: u32 },
    InvalidConfig(&'static str),
    UnknownRoute(u32),
    InvalidInterval { departure: u32, arrival: u32 },
    DirectoryFull { capacity: usize },
    TicketIdInUse { tid: u64 },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::TooManyStations { stations, max } => {
                write!(f, "{stations} stations exceed the {max}-bit segment mask")
            }
            EngineError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            EngineError::UnknownRoute(route) => write!(f, "unknown route: {route}"),
            EngineError::InvalidInterval { departure, arrival } => {
                write!(f, "invalid interval: departure {departure}, arrival {arrival}")
            }
            EngineError::DirectoryFull { capacity } => {
                write!(f, "ticket directory full: all {capacity} ids issued")
            }
            EngineError::TicketIdInUse { tid } => write!(f, "ticket id {tid} already issued"),
        }
    }
}

impl std::error::Error for EngineError {}
