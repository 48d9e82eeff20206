#[cfg(test)]
pub mod test {
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::config_file::{ConfigFile, Format};
    use crate::env;
    use crate::error::{BoxError, CfgError};
    use crate::record::{Config, FromEnv, FromFlags, FromIo, Visitor};
    use crate::types::Key;

    /// A service with every kind of field, a config file and two commands.
    #[derive(Debug, Clone, PartialEq)]
    pub struct AppConfig {
        pub host: String,
        pub port: u16,
        pub debug: bool,
        pub tags: Vec<String>,
        pub limits: BTreeMap<String, u32>,
        pub timeout: Duration,
        pub secret: String,
        pub log: LogConfig,
        pub file: ConfigFile,
        pub start: StartCmd,
        pub stop: StopCmd,

        pub initialized: bool,
        pub done_called: bool,
        pub commands: Vec<String>,
        pub args: Vec<String>,
    }

    impl Default for AppConfig {
        fn default() -> Self {
            Self {
                host: "localhost".into(),
                port: 80,
                debug: false,
                tags: Vec::new(),
                limits: BTreeMap::new(),
                timeout: Duration::from_secs(30),
                secret: "s3cret".into(),
                log: LogConfig::default(),
                file: ConfigFile::new(Format::Toml),
                start: StartCmd::default(),
                stop: StopCmd::default(),
                initialized: false,
                done_called: false,
                commands: Vec::new(),
                args: Vec::new(),
            }
        }
    }

    impl Config for AppConfig {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("Host"), &mut self.host)?;
            fields.field(Key::new("Port").tag("port"), &mut self.port)?;
            fields.field(Key::new("Debug"), &mut self.debug)?;
            fields.field(Key::new("Tags").separators(";"), &mut self.tags)?;
            fields.field(Key::new("Limits"), &mut self.limits)?;
            fields.field(
                Key::new("Timeout").format("toml", "request_timeout"),
                &mut self.timeout,
            )?;
            fields.field(Key::new("Secret").tag("-"), &mut self.secret)?;
            fields.group(Key::new("Log"), &mut self.log)?;
            fields.group(Key::new("File").tag(",inline"), &mut self.file)?;
            fields.group(Key::new("start"), &mut self.start)?;
            fields.group(Key::new("stop"), &mut self.stop)
        }

        fn init(&mut self) -> Result<(), BoxError> {
            if self.port == 0 {
                return Err("port must not be zero".into());
            }
            self.initialized = true;
            Ok(())
        }

        fn usage(&self, name: &str) -> String {
            match name {
                "" => "demo service",
                "Host" => "host name",
                "port" => "port to listen on",
                "Tags" => "labels, separated by ';'",
                "Limits" => "resource limits",
                "Timeout" => "request timeout",
                "Log" => "logging",
                _ => "",
            }
            .to_string()
        }

        fn flags(&mut self) -> Option<&mut dyn FromFlags> {
            Some(self)
        }

        fn env(&self) -> Option<&dyn FromEnv> {
            Some(self)
        }

        fn io(&mut self) -> Option<&mut dyn FromIo> {
            Some(&mut self.file)
        }
    }

    impl FromFlags for AppConfig {
        fn short(&self, name: &str) -> Option<char> {
            (name == "port").then_some('p')
        }

        fn done(&mut self, commands: &[String], args: &[String]) -> Result<(), BoxError> {
            self.done_called = true;
            self.commands = commands.to_vec();
            self.args = args.to_vec();
            Ok(())
        }
    }

    impl FromEnv for AppConfig {
        fn var(&self, name: &str) -> String {
            if name.eq_ignore_ascii_case("name") {
                return String::new();
            }
            env::prefixed("APP", name)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct LogConfig {
        pub level: String,
        pub file: PathBuf,
        pub initialized: bool,
    }

    impl Default for LogConfig {
        fn default() -> Self {
            Self {
                level: "info".into(),
                file: PathBuf::new(),
                initialized: false,
            }
        }
    }

    impl Config for LogConfig {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("Level"), &mut self.level)?;
            fields.field(Key::new("File"), &mut self.file)
        }

        fn init(&mut self) -> Result<(), BoxError> {
            self.initialized = true;
            Ok(())
        }

        fn usage(&self, name: &str) -> String {
            match name {
                "Level" => "log verbosity".into(),
                _ => String::new(),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct StartCmd {
        pub workers: u32,
        pub foreground: bool,
        pub initialized: bool,
        pub commands: Vec<String>,
        pub args: Vec<String>,
    }

    impl Default for StartCmd {
        fn default() -> Self {
            Self {
                workers: 1,
                foreground: false,
                initialized: false,
                commands: Vec::new(),
                args: Vec::new(),
            }
        }
    }

    impl Config for StartCmd {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("Workers"), &mut self.workers)?;
            fields.field(Key::new("Foreground"), &mut self.foreground)
        }

        fn init(&mut self) -> Result<(), BoxError> {
            self.initialized = true;
            Ok(())
        }

        fn usage(&self, name: &str) -> String {
            match name {
                "" => "start the service",
                "Workers" => "worker threads",
                "Foreground" => "stay in the foreground",
                _ => "",
            }
            .to_string()
        }

        fn flags(&mut self) -> Option<&mut dyn FromFlags> {
            Some(self)
        }

        fn env(&self) -> Option<&dyn FromEnv> {
            Some(self)
        }
    }

    impl FromFlags for StartCmd {
        fn done(&mut self, commands: &[String], args: &[String]) -> Result<(), BoxError> {
            self.commands = commands.to_vec();
            self.args = args.to_vec();
            Ok(())
        }
    }

    impl FromEnv for StartCmd {
        fn var(&self, name: &str) -> String {
            env::prefixed("APP_START", name)
        }
    }

    /// A command without help text, hidden from listings.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct StopCmd {
        pub force: bool,
        pub initialized: bool,
    }

    impl Config for StopCmd {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("Force"), &mut self.force)
        }

        fn init(&mut self) -> Result<(), BoxError> {
            self.initialized = true;
            Ok(())
        }

        fn flags(&mut self) -> Option<&mut dyn FromFlags> {
            Some(self)
        }
    }

    impl FromFlags for StopCmd {}

    /// A record used as a leaf value.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Endpoint {
        pub host: String,
        pub port: u16,
    }

    impl Default for Endpoint {
        fn default() -> Self {
            Self {
                host: "localhost".into(),
                port: 80,
            }
        }
    }

    impl Config for Endpoint {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("Host"), &mut self.host)?;
            fields.field(Key::new("Port"), &mut self.port)
        }
    }

    crate::record_field!(Endpoint);

    /// Signed numbers for flag parsing.
    #[derive(Debug, Default)]
    pub struct Signed {
        pub offset: i32,
        pub scale: f64,
    }

    impl Config for Signed {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("Offset"), &mut self.offset)?;
            fields.field(Key::new("Scale"), &mut self.scale)
        }

        fn flags(&mut self) -> Option<&mut dyn FromFlags> {
            Some(self)
        }
    }

    impl FromFlags for Signed {}

    // -- Records whose description is broken ---------------------------------

    #[derive(Debug, Default)]
    pub struct BadTag {
        pub port: u16,
    }

    impl Config for BadTag {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("Port").tag(",bogus"), &mut self.port)
        }
    }

    #[derive(Debug, Default)]
    pub struct BadSeparators {
        pub tags: Vec<String>,
    }

    impl Config for BadSeparators {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("Tags").separators(";=|"), &mut self.tags)
        }
    }

    #[derive(Debug, Default)]
    pub struct CaseClash {
        pub upper: u16,
        pub lower: u16,
    }

    impl Config for CaseClash {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("Port"), &mut self.upper)?;
            fields.field(Key::new("port"), &mut self.lower)
        }
    }

    #[derive(Debug, Default)]
    pub struct InlineClash {
        pub host: String,
        pub extra: HostOnly,
    }

    impl Config for InlineClash {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("Host"), &mut self.host)?;
            fields.group(Key::new("Extra").tag(",inline"), &mut self.extra)
        }
    }

    #[derive(Debug, Default)]
    pub struct HostOnly {
        pub host: String,
    }

    impl Config for HostOnly {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("Host"), &mut self.host)
        }
    }

    #[derive(Debug, Default)]
    pub struct CommandClash {
        pub stop: bool,
        pub cmd: StopCmd,
    }

    impl Config for CommandClash {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("stop"), &mut self.stop)?;
            fields.group(Key::new("Stop"), &mut self.cmd)
        }
    }

    // -- Deeper nesting ------------------------------------------------------

    #[derive(Debug, Default)]
    pub struct Nested {
        pub outer: Outer,
    }

    #[derive(Debug, Default)]
    pub struct Outer {
        pub inner: Inner,
    }

    #[derive(Debug, Default)]
    pub struct Inner {
        pub depth: u8,
    }

    impl Config for Nested {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.group(Key::new("Outer"), &mut self.outer)
        }
    }

    impl Config for Outer {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.group(Key::new("Inner"), &mut self.inner)
        }
    }

    impl Config for Inner {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("Depth"), &mut self.depth)
        }
    }

    /// A record that leaves its description to an inline group.
    #[derive(Debug, Default)]
    pub struct Quiet {
        pub about: About,
    }

    #[derive(Debug, Default)]
    pub struct About {
        pub verbose: bool,
    }

    impl Config for Quiet {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.group(Key::new("About").tag(",inline"), &mut self.about)
        }
    }

    impl Config for About {
        fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
            fields.field(Key::new("Verbose"), &mut self.verbose)
        }

        fn usage(&self, name: &str) -> String {
            match name {
                "" => "described by a group".into(),
                _ => String::new(),
            }
        }
    }

    #[test]
    fn app_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 80);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.log.level, "info");
        assert_eq!(config.start.workers, 1);
        assert_eq!(config.file.format, Format::Toml);
    }
}
