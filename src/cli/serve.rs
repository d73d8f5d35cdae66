use anyhow::{Context, anyhow};
use clap::Parser;
use log::{error, info};
use prometheus::{BasicAuthentication, labels};
use tokio::task::spawn_blocking;
use tokio::time::{Duration, sleep};

use crate::cli::SubCommandExtend;
use crate::config::{DigestOptions, ExtractorOptions};
use crate::dispatcher::JobDispatcher;
use crate::extractor::CommandExtractor;
use crate::library::LibraryStore;
use crate::server::{PortBinder, Server, announce_port};
use crate::worker::Worker;
use crate::Opts;

#[derive(Parser, Debug, Clone)]
pub struct ServeCommand {
    #[command(flatten)]
    pub extractor: ExtractorOptions,
    #[command(flatten)]
    pub digest: DigestOptions,
    /// 起始端口，不填则随机选择
    #[arg(short, long)]
    pub port: Option<u16>,
    /// 端口被占用时最多尝试的次数
    #[arg(long, value_name = "N", default_value_t = 64)]
    pub bind_attempts: u32,
    /// 工作线程数，0 表示使用 CPU 逻辑核数
    #[arg(short = 'j', long, value_name = "N", default_value_t = 0)]
    pub workers: usize,
    /// 只找出重复文件并更新曲库，不删除文件
    #[arg(long)]
    pub dry_run: bool,
    /// prometheus 主动推送地址
    #[arg(long, value_name = "URL")]
    pub prometheus_push: Option<String>,
    /// 自定义 instance 标签值
    #[arg(long, value_name = "NAME")]
    pub prometheus_instance: Option<String>,
    /// prometheus 认证信息，格式为 username:password
    #[arg(long, value_name = "AUTH")]
    pub prometheus_auth: Option<String>,
}

impl SubCommandExtend for ServeCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let store = LibraryStore::from(&opts.conf_dir);
        let worker = Worker::new(CommandExtractor::from(&self.extractor), self.digest.hash);
        let dispatcher = JobDispatcher::new(worker, self.workers)?;
        let (listener, port) = PortBinder::new(self.port, self.bind_attempts).bind()?;
        let server = Server::new(listener, dispatcher, store)?.dry_run(self.dry_run);

        self.spawn_metrics_push(port)?;

        announce_port(std::io::stdout().lock(), port).context("输出端口失败")?;
        info!("指纹服务启动：127.0.0.1:{}，曲库：{}", port, opts.conf_dir.library().display());

        spawn_blocking(move || server.serve()).await?
    }
}

impl ServeCommand {
    fn spawn_metrics_push(&self, port: u16) -> anyhow::Result<()> {
        let Some(url) = self.prometheus_push.clone() else {
            return Ok(());
        };
        let instance =
            self.prometheus_instance.clone().unwrap_or_else(|| format!("127.0.0.1:{}", port));
        let auth = match &self.prometheus_auth {
            Some(s) => {
                let (username, password) =
                    s.split_once(':').ok_or_else(|| anyhow!("认证信息格式应为 username:password"))?;
                Some((username.to_string(), password.to_string()))
            }
            None => None,
        };

        tokio::spawn(async move {
            loop {
                let metric_families = prometheus::gather();
                let url = url.clone();
                let instance = instance.clone();
                let auth = auth.clone();
                let r = spawn_blocking(move || {
                    prometheus::push_metrics(
                        "audedup",
                        labels! {
                            "instance".to_string() => instance,
                        },
                        &url,
                        metric_families,
                        auth.map(|(username, password)| BasicAuthentication { username, password }),
                    )
                })
                .await;
                match r {
                    Ok(Err(e)) => error!("推送指标失败: {e}"),
                    Err(e) => error!("推送指标失败: {e}"),
                    Ok(Ok(())) => {}
                }
                sleep(Duration::from_secs(30)).await;
            }
        });
        Ok(())
    }
}
