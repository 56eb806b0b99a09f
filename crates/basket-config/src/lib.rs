mod model;
mod store;
mod validate;

pub use model::{
    BasketConfig, BridgeSection, BrokerSection, ConfigError, JsonlSection, OutputsSection,
    ServerSection, TopicsSection, DEFAULT_CONFIG_PATH,
};
pub use store::{load, load_or_default, ConfigStore};
