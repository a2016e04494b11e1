pub mod settings;

pub use settings::{
    AppSettings, DeepgramSettings, OpenAiSettings, PropertiesSettings, RolesSettings, Settings,
};
