mod port;

use std::io::{self, Write};
use std::net::{TcpListener, TcpStream};

use anyhow::Result;
use log::{info, warn};
use serde_json::json;

pub use self::port::PortBinder;
use crate::deleter::{DeleteReport, delete_files};
use crate::dispatcher::JobDispatcher;
use crate::extractor::FeatureExtractor;
use crate::library::{DedupSummary, LibraryStore};
use crate::metrics;
use crate::protocol::read_request;
use crate::streamer::ResultStreamer;

/// 一次连接的处理结果
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub streamed: usize,
    pub summary: DedupSummary,
    pub deleted: DeleteReport,
}

/// 在标准输出打印绑定的端口，父进程以此发现服务
pub fn announce_port(mut out: impl Write, port: u16) -> io::Result<()> {
    writeln!(out, "{}", json!({ "port": port }))?;
    out.flush()
}

/// 指纹服务，一次只处理一个连接
pub struct Server<E> {
    listener: TcpListener,
    dispatcher: JobDispatcher<E>,
    store: LibraryStore,
    dry_run: bool,
}

impl<E: FeatureExtractor> Server<E> {
    /// 创建服务，曲库中的摘要必须与当前哈希算法一致
    pub fn new(
        listener: TcpListener,
        dispatcher: JobDispatcher<E>,
        store: LibraryStore,
    ) -> Result<Self> {
        store.load()?.check_algorithm(dispatcher.worker().algorithm())?;
        Ok(Self { listener, dispatcher, store, dry_run: false })
    }

    /// 只计算重复文件，不删除
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn listener(&self) -> &TcpListener {
        &self.listener
    }

    /// 循环处理连接，只有曲库读写失败才会返回
    pub fn serve(&self) -> Result<()> {
        loop {
            self.serve_one()?;
        }
    }

    /// 等待并处理一个连接
    pub fn serve_one(&self) -> Result<SessionReport> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                info!("客户端已连接: {}", addr);
                self.handle(stream)
            }
            Err(e) => {
                warn!("接受连接失败: {}", e);
                Ok(SessionReport::default())
            }
        }
    }

    /// 读取请求、分发、去重、删除，然后关闭连接
    pub fn handle(&self, stream: TcpStream) -> Result<SessionReport> {
        let paths = match read_request(&stream) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("读取请求失败: {}", e);
                return Ok(SessionReport::default());
            }
        };
        if paths.is_empty() {
            info!("空请求，跳过");
            return Ok(SessionReport::default());
        }

        info!("开始处理 {} 个文件，线程数 {}", paths.len(), self.dispatcher.workers());
        let streamer = ResultStreamer::new(&stream);
        let results = self.dispatcher.dispatch(paths, &streamer);

        let outcome = self.store.run_pass(&results)?;
        metrics::inc_duplicates(outcome.duplicates.len());

        let duplicates = outcome.duplicates.iter().map(|p| p.path()).collect::<Vec<_>>();
        let deleted = if self.dry_run {
            for path in &duplicates {
                info!("[dry-run] 重复文件: {}", path.display());
            }
            DeleteReport::default()
        } else {
            delete_files(&duplicates)
        };

        Ok(SessionReport { streamed: streamer.sent(), summary: outcome.summary, deleted })
    }
}
