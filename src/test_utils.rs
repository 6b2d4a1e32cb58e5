//! In-process fakes for the remote service, the downloader, the server
//! initializer and the interactive prompt.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::cancel::Cancellation;
use crate::context::{Context, LaunchSettings, Options};
use crate::error::{Error, Result};
use crate::install::ServerInitializer;
use crate::paths::{EULA_FILE, SERVER_JAR_FILE, SERVER_PROPERTIES_FILE};
use crate::prompt::PromptChoice;
use crate::remote::{ArtifactDownloader, RemoteVersionService};
use crate::versions::{Channel, VersionDescriptor};

pub const TEST_META_URL: &str = "https://meta.test/v2/versions";

pub const TEMPLATE_PROPERTIES: &str = "#Minecraft server properties
level-name=world
server-port=25565
query.port=25565
motd=A Minecraft Server
";

/// Answers prompts from a fixed list and records what was asked.
pub struct ScriptedPrompt {
    answers: RefCell<VecDeque<usize>>,
    asked: RefCell<Vec<(String, Vec<String>)>>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = usize>) -> Self {
        Self {
            answers: RefCell::new(answers.into_iter().collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<(String, Vec<String>)> {
        self.asked.borrow().clone()
    }
}

impl PromptChoice for ScriptedPrompt {
    fn choose(&self, message: &str, options: &[String]) -> Result<usize> {
        self.asked
            .borrow_mut()
            .push((message.to_string(), options.to_vec()));
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Error::Prompt(format!("unexpected prompt: {message}")))
    }
}

pub struct StubRemote {
    game: Vec<VersionDescriptor>,
    loader: Vec<VersionDescriptor>,
    installer: Vec<VersionDescriptor>,
    queried: RefCell<Vec<Channel>>,
}

impl StubRemote {
    pub fn new(
        game: Vec<VersionDescriptor>,
        loader: Vec<VersionDescriptor>,
        installer: Vec<VersionDescriptor>,
    ) -> Self {
        Self {
            game,
            loader,
            installer,
            queried: RefCell::new(Vec::new()),
        }
    }

    pub fn queried(&self) -> Vec<Channel> {
        self.queried.borrow().clone()
    }
}

impl Default for StubRemote {
    fn default() -> Self {
        Self::new(
            vec![
                VersionDescriptor::new("23w33a", false),
                VersionDescriptor::new("1.20.1", true),
                VersionDescriptor::new("1.20", true),
            ],
            vec![
                VersionDescriptor::new("0.14.22", true),
                VersionDescriptor::new("0.14.21", true),
            ],
            vec![VersionDescriptor::new("0.11.2", true)],
        )
    }
}

impl RemoteVersionService for StubRemote {
    fn versions(&self, channel: Channel) -> Result<Vec<VersionDescriptor>> {
        self.queried.borrow_mut().push(channel);
        Ok(match channel {
            Channel::Game => self.game.clone(),
            Channel::Loader => self.loader.clone(),
            Channel::Installer => self.installer.clone(),
        })
    }

    fn base_url(&self) -> &str {
        TEST_META_URL
    }
}

/// Writes a fixed payload as the server jar and records requested URLs.
#[derive(Default)]
pub struct RecordingDownloader {
    urls: RefCell<Vec<String>>,
    reject: Cell<bool>,
}

impl RecordingDownloader {
    pub fn urls(&self) -> Vec<String> {
        self.urls.borrow().clone()
    }

    /// Every later download answers as if the server returned an error status.
    pub fn fail_with_status(&self) {
        self.reject.set(true);
    }

    pub fn payload(&self) -> Vec<u8> {
        b"fake fabric server jar".to_vec()
    }
}

impl ArtifactDownloader for RecordingDownloader {
    fn download(&self, url: &str, destination: &Path) -> Result<PathBuf> {
        self.urls.borrow_mut().push(url.to_string());
        if self.reject.get() {
            return Err(Error::InvalidVersionCombination {
                url: url.to_string(),
            });
        }
        let jar = destination.join(SERVER_JAR_FILE);
        std::fs::write(&jar, self.payload()).map_err(|e| Error::io("write jar", e))?;
        Ok(jar)
    }
}

/// Behaves like `--initSettings`: writes default properties and the EULA.
#[derive(Default)]
pub struct StubInitializer {
    runs: Cell<usize>,
    fail: Cell<bool>,
}

impl StubInitializer {
    pub fn runs(&self) -> usize {
        self.runs.get()
    }

    /// Later runs still write their files, then report failure.
    pub fn fail_after_writing(&self) {
        self.fail.set(true);
    }
}

impl ServerInitializer for StubInitializer {
    fn initialize(&self, dir: &Path, jar: &Path, _show_output: bool) -> Result<()> {
        self.runs.set(self.runs.get() + 1);
        assert!(jar.exists(), "initializer ran without a jar");
        std::fs::write(dir.join(SERVER_PROPERTIES_FILE), TEMPLATE_PROPERTIES)
            .map_err(|e| Error::io("write properties", e))?;
        std::fs::write(dir.join(EULA_FILE), "eula=false\n").map_err(|e| Error::io("write eula", e))?;
        if self.fail.get() {
            return Err(Error::io(
                "server exited",
                std::io::Error::new(std::io::ErrorKind::Other, "init failed"),
            ));
        }
        Ok(())
    }
}

/// Owns one of each fake and lends them out as a [`Context`].
pub struct Fixture {
    pub remote: StubRemote,
    pub downloader: RecordingDownloader,
    pub initializer: StubInitializer,
    pub prompt: ScriptedPrompt,
    pub options: Options,
    pub cancel: Cancellation,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_answers([])
    }

    pub fn with_answers(answers: impl IntoIterator<Item = usize>) -> Self {
        Self {
            remote: StubRemote::default(),
            downloader: RecordingDownloader::default(),
            initializer: StubInitializer::default(),
            prompt: ScriptedPrompt::new(answers),
            options: Options::default(),
            cancel: Cancellation::manual(),
        }
    }

    pub fn context(&self) -> Context<'_> {
        Context {
            remote: &self.remote,
            downloader: &self.downloader,
            initializer: &self.initializer,
            prompt: &self.prompt,
            options: self.options.clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn launch_settings(&self) -> LaunchSettings {
        LaunchSettings {
            user: "mc".to_string(),
            min_ram: 0.5,
            max_ram: 6.0,
            idle_time: 0,
            backups: 5,
            java: "java".to_string(),
            java_args: Vec::new(),
        }
    }
}
