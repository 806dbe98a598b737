#![allow(dead_code)]

use proctask::config::{TaskConfiguration, TaskConfigurationBuilder};
use proctask::stream::StreamSpec;
use proctask::types::CaptureMode;

/// `/bin/sh -c <script>`.
pub fn shell(script: &str) -> TaskConfigurationBuilder {
    TaskConfiguration::builder("/bin/sh").arg("-c").arg(script)
}

/// `/bin/sh -c <script>` with stdout and stderr captured as text.
pub fn captured_shell(script: &str) -> TaskConfigurationBuilder {
    shell(script)
        .stdout(StreamSpec::capture(CaptureMode::Text))
        .stderr(StreamSpec::capture(CaptureMode::Text))
}

/// A long-running `sleep`.
pub fn sleeper(secs: u32) -> TaskConfigurationBuilder {
    TaskConfiguration::builder("/bin/sleep").arg(secs.to_string())
}

/// A configuration for fake backends; the path is never executed.
pub fn fake(program: &str) -> TaskConfigurationBuilder {
    TaskConfiguration::builder(format!("/fake/bin/{program}"))
}
