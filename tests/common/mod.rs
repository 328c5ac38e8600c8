#![allow(dead_code)]

pub mod app_root {
    use dio::Settings;
    use std::path::Path;
    use tempfile::TempDir;

    /// Scratch application root with `views/`, `public/` and
    /// `controllers/` underneath.
    pub struct AppRoot {
        pub dir: TempDir,
    }

    impl AppRoot {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            for sub in ["views", "public", "controllers"] {
                std::fs::create_dir_all(dir.path().join(sub)).unwrap();
            }
            Self { dir }
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }

        pub fn settings(&self) -> Settings {
            Settings {
                root: self.path().to_path_buf(),
                workers: 2,
                ..Settings::default()
            }
        }

        /// Write `content` at `relative`, creating parent directories.
        pub fn write(&self, relative: &str, content: &str) -> std::path::PathBuf {
            let path = self.path().join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, content).unwrap();
            path
        }

        /// Rewrite a manifest and push its mtime forward so the next
        /// lookup sees it as changed.
        pub fn rewrite_manifest(&self, name: &str, content: &str, bump_secs: u64) {
            let path = self.write(&format!("controllers/{name}.yaml"), content);
            let later = std::time::SystemTime::now() + std::time::Duration::from_secs(bump_secs);
            std::fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(later)
                .unwrap();
        }
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    /// Send a raw HTTP/1.1 request and read until the server closes or
    /// goes quiet.
    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {e:?}"),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// `(status, header lookup, body)` of a raw response.
    pub fn parse_response(resp: &str) -> (u16, Vec<(String, String)>, String) {
        let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let mut status = 0;
        let mut headers = Vec::new();
        for line in head.lines() {
            if line.starts_with("HTTP/1.") {
                status = line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("0")
                    .parse()
                    .unwrap();
            } else if let Some((name, val)) = line.split_once(':') {
                headers.push((name.trim().to_string(), val.trim().to_string()));
            }
        }
        (status, headers, body.to_string())
    }

    pub fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
