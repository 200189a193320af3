//! Remote Build operations: status, load and unload, with log feedback.
//!
//! Each command that changes plugin state is bracketed by a log session that
//! opens before the request goes out. The host can write compile output while
//! the round trip is still in flight, and that output would otherwise fall
//! before the watch loop's baseline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use tmrb_rpc::{ControlChannel, PluginSource, PluginType, Request, Response, Route};
use tracing::{debug, error};

use crate::log::{LOG_FILE_NAME, LogTailer};

/// Settings for one `load_plugin` call.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub source: PluginSource,
    pub kind: PluginType,
    /// Empty polls after the first hit before the log counts as settled
    pub log_done_limit: u32,
    pub log_check_interval: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            source: PluginSource::User,
            kind: PluginType::Zip,
            log_done_limit: 3,
            log_check_interval: Duration::from_secs(1),
        }
    }
}

pub struct RemoteBuildClient {
    channel: ControlChannel,
    tailer: LogTailer,
    op_dir: Option<PathBuf>,
    data_folder: Option<PathBuf>,
}

impl RemoteBuildClient {
    /// `op_dir` overrides the data folder reported by the host.
    #[must_use]
    pub fn new(channel: ControlChannel, tailer: LogTailer, op_dir: Option<PathBuf>) -> Self {
        Self {
            channel,
            tailer,
            op_dir,
            data_folder: None,
        }
    }

    #[must_use]
    pub fn channel(&self) -> &ControlChannel {
        &self.channel
    }

    #[must_use]
    pub fn tailer(&self) -> &LogTailer {
        &self.tailer
    }

    #[must_use]
    pub fn data_folder(&self) -> Option<&Path> {
        self.data_folder.as_deref()
    }

    /// Send `route` with `data` and decode the reply.
    ///
    /// Any failure gives an empty response, which reads as "no error".
    pub async fn send_route(&mut self, route: Route, data: Map<String, Value>) -> Response {
        exchange(&mut self.channel, Request::new(route, data)).await
    }

    pub async fn get_status(&mut self) -> bool {
        self.send_route(Route::GetStatus, Map::new())
            .await
            .is_alive()
    }

    /// Resolve the folder holding `Openplanet.log` and point the tailer at it.
    ///
    /// An explicit `op_dir` wins without contacting the host.
    pub async fn get_data_folder(&mut self) -> bool {
        if let Some(op_dir) = self.op_dir.clone() {
            self.use_data_folder(op_dir);
            return true;
        }

        if !self.get_status().await {
            return false;
        }

        let response = self.send_route(Route::GetDataFolder, Map::new()).await;
        match response.data_str() {
            Some(folder) if Path::new(folder).is_dir() => {
                self.use_data_folder(PathBuf::from(folder));
            }
            other => debug!("Host reported unusable data folder: {other:?}"),
        }
        self.data_folder.is_some()
    }

    fn use_data_folder(&mut self, folder: PathBuf) {
        self.tailer.set_path(folder.join(LOG_FILE_NAME));
        self.data_folder = Some(folder);
    }

    /// Load (or reload) a plugin, then follow the log until it settles.
    ///
    /// Returns `true` if the host reported no error.
    pub async fn load_plugin(&mut self, plugin_id: &str, options: &LoadOptions) -> bool {
        if !self.get_status().await {
            return false;
        }

        self.tailer.set_plugin_id(Some(plugin_id));
        let request = Request::load_plugin(plugin_id, options.source, options.kind);
        let response = {
            let _session = self.tailer.session();
            exchange(&mut self.channel, request).await
        };

        // Without a log there is nothing that could ever settle.
        if self.tailer.file_path().is_some() {
            self.tailer
                .watch_and_print(options.log_done_limit, options.log_check_interval)
                .await;
        }

        report_errors(&response);
        response.is_success()
    }

    pub async fn unload_plugin(&mut self, plugin_id: &str) -> bool {
        if !self.get_status().await {
            return false;
        }

        self.tailer.set_plugin_id(Some(plugin_id));
        let response = {
            let _session = self.tailer.session();
            exchange(&mut self.channel, Request::unload_plugin(plugin_id)).await
        };

        report_errors(&response);
        response.is_success()
    }

    /// Follow the log for `plugin_id` without sending any command, replaying
    /// the last `back` bytes first.
    pub async fn watch_logs(
        &mut self,
        plugin_id: &str,
        back: u64,
        log_done_limit: u32,
        interval: Duration,
    ) {
        self.tailer.set_plugin_id(Some(plugin_id));
        self.tailer.watch_from(back, log_done_limit, interval).await;
    }
}

async fn exchange(channel: &mut ControlChannel, request: Request) -> Response {
    let route = request.route;
    if !channel.connect().await || !channel.send_request(request).await {
        return Response::default();
    }

    let text = channel.receive().await;
    match serde_json::from_str(&text) {
        Ok(response) => response,
        Err(e) => {
            debug!("Unreadable response to {route}: {e}");
            Response::default()
        }
    }
}

fn report_errors(response: &Response) {
    for line in error_lines(response) {
        error!("{line}");
    }
}

/// The response's error text split into one entry per non-blank line.
pub(crate) fn error_lines(response: &Response) -> Vec<String> {
    response
        .error_text()
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
