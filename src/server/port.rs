use std::io::ErrorKind;
use std::net::{Ipv4Addr, TcpListener};

use anyhow::{Context, Result, bail};
use log::debug;
use rand::Rng;

const MIN_PORT: u16 = 1024;

/// 在回环地址上寻找可用端口
#[derive(Debug, Clone)]
pub struct PortBinder {
    start: u16,
    max_attempts: u32,
}

impl PortBinder {
    /// `start` 为 `None` 时随机选择起始端口
    pub fn new(start: Option<u16>, max_attempts: u32) -> Self {
        let start = start.unwrap_or_else(|| rand::rng().random_range(MIN_PORT..=u16::MAX));
        Self { start, max_attempts: max_attempts.max(1) }
    }

    /// 绑定端口，端口被占用时尝试下一个，超过次数后返回错误
    pub fn bind(&self) -> Result<(TcpListener, u16)> {
        let mut port = self.start;
        for _ in 0..self.max_attempts {
            match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
                Ok(listener) => {
                    let port = listener.local_addr().context("读取监听地址失败")?.port();
                    return Ok((listener, port));
                }
                Err(e)
                    if matches!(e.kind(), ErrorKind::AddrInUse | ErrorKind::PermissionDenied) =>
                {
                    debug!("端口 {} 不可用: {}", port, e);
                    port = next_port(port);
                }
                Err(e) => return Err(e).context("绑定端口失败"),
            }
        }
        bail!("尝试 {} 次后仍未找到可用端口", self.max_attempts)
    }
}

fn next_port(port: u16) -> u16 {
    if port == u16::MAX { MIN_PORT } else { port.max(MIN_PORT - 1) + 1 }
}
