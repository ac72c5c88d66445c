//! Where the pomod socket lives
//!
//! Lookup order: `$POMO_SOCKET`, then `$XDG_RUNTIME_DIR/pomod/pomod.sock`,
//! then `/tmp/pomod-$USER/pomod.sock`. None of these need root.

use std::env;
use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const POMO_SOCKET_ENV: &str = "POMO_SOCKET";

const SOCKET_FILENAME: &str = "pomod.sock";
const APP_DIR: &str = "pomod";

/// Socket path honoring every override, for clients that parse no env vars
/// of their own.
pub fn default_socket_path() -> PathBuf {
    env::var_os(POMO_SOCKET_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(socket_path_without_env)
}

/// Socket path ignoring `$POMO_SOCKET`. Used as a clap default, since clap
/// reads that variable itself.
pub fn socket_path_without_env() -> PathBuf {
    socket_path_in(
        env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from),
        env::var("USER").ok().as_deref(),
    )
}

fn socket_path_in(runtime_dir: Option<PathBuf>, user: Option<&str>) -> PathBuf {
    let dir = match runtime_dir {
        Some(runtime_dir) => runtime_dir.join(APP_DIR),
        None => PathBuf::from(format!("/tmp/{}-{}", APP_DIR, user.unwrap_or("unknown"))),
    };

    dir.join(SOCKET_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_runtime_dir() {
        let path = socket_path_in(Some(PathBuf::from("/run/user/1000")), Some("ada"));
        assert_eq!(path, PathBuf::from("/run/user/1000/pomod/pomod.sock"));
    }

    #[test]
    fn falls_back_to_tmp_per_user() {
        let path = socket_path_in(None, Some("ada"));
        assert_eq!(path, PathBuf::from("/tmp/pomod-ada/pomod.sock"));

        let path = socket_path_in(None, None);
        assert_eq!(path, PathBuf::from("/tmp/pomod-unknown/pomod.sock"));
    }

    #[test]
    fn env_free_path_ends_with_socket_filename() {
        assert_eq!(socket_path_without_env().file_name().unwrap(), SOCKET_FILENAME);
    }
}
