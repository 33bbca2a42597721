use serde_derive::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigLoad {
    version: u8,

    pub prompt: Option<String>,

    /// Show timing after executing a command. Only meaningful in
    /// non-interactive mode.
    pub show_stats: Option<bool>,

    /// Multi line mode, default is true.
    pub multi_line: Option<bool>,

    /// Directory workspace registry/definitions are persisted under.
    pub data_dir: Option<String>,
}

impl Default for ConfigLoad {
    fn default() -> Self {
        ConfigLoad {
            version: 0,
            prompt: Some("workspace".to_string()),
            show_stats: Some(false),
            multi_line: Some(true),
            data_dir: Some(".workspace-cli".to_string()),
        }
    }
}

impl ConfigLoad {
    pub fn terminal_update(&mut self) {
        self.show_stats = Some(true);
    }
}
