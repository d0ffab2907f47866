pub mod autowatch;

pub use autowatch::{
    ArchiveCfg, AutoWatchConfig, NotifyCfg, ScheduleCfg, SourcesCfg, StoreCfg,
    DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH,
};
