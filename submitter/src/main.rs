use anyhow::Context;
use clap::Parser;
use oj_submitter::{
    client::{
        config::ClientConfig,
        model::{ProgressEvent, SubmissionRequest, TestCase},
        ClientError, StreamingSubmissionClient,
    },
    prelude::CancellationToken,
    session::SessionToken,
};
use std::{
    process::exit,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

mod opt;

static CTRL_C: AtomicBool = AtomicBool::new(false);

const EXIT_ACCEPTED: i32 = 0;
const EXIT_REJECTED: i32 = 1;
const EXIT_INCONCLUSIVE: i32 = 2;
const EXIT_ERROR: i32 = 3;

#[tokio::main]
async fn main() {
    let opt = opt::Opts::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&opt.opt.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || handle_ctrl_c(&cancel))
            .expect("Failed to set termination handler!");
    }

    let code = match client(opt, cancel).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    };
    exit(code);
}

async fn client(opt: opt::Opts, cancel: CancellationToken) -> anyhow::Result<i32> {
    let mut cfg = ClientConfig::load_or_default(opt.opt.config.as_deref()).await?;
    if let Some(host) = opt.opt.host {
        cfg.host = host;
    }
    if opt.opt.ssl {
        cfg.ssl = true;
    }
    if let Some(token) = opt.opt.token {
        cfg.access_token = Some(token);
    }

    let session = Arc::new(SessionToken::new(cfg.access_token.clone()));
    if !session.is_logged_in() {
        tracing::warn!("No access token given, the judge will probably refuse the request");
    }
    let client = StreamingSubmissionClient::new(Arc::new(cfg), session)?;

    let req = match opt.cmd {
        opt::SubCmd::Submit(cmd) => {
            let code = read_code(&cmd).await?;
            SubmissionRequest::submit(cmd.question, cmd.language, code)
        }
        opt::SubCmd::SelfTest(cmd) => {
            let code = read_code(&cmd.submission).await?;
            let mut cases = Vec::with_capacity(cmd.cases.len());
            for case in &cmd.cases {
                let input = tokio::fs::read(&case.input)
                    .await
                    .with_context(|| format!("reading {}", case.input.display()))?;
                let output = tokio::fs::read(&case.output)
                    .await
                    .with_context(|| format!("reading {}", case.output.display()))?;
                cases.push(TestCase::from_bytes(input, output));
            }
            SubmissionRequest::self_test(
                cmd.submission.question,
                cmd.submission.language,
                code,
                cases,
            )
        }
    };

    let res = client
        .run_with_cancel(&req, print_progress, &cancel)
        .await;

    match res {
        Ok(Some(ev)) => {
            println!(
                "{}: {}/{} accepted, {} ms, {} KB",
                ev.commit_result, ev.accept_num, ev.judge_case_num, ev.consume_time, ev.consume_memory
            );
            Ok(if ev.is_accepted() {
                EXIT_ACCEPTED
            } else {
                EXIT_REJECTED
            })
        }
        Ok(None) => {
            println!("Connection to the judge was lost before a verdict arrived");
            Ok(EXIT_INCONCLUSIVE)
        }
        Err(ClientError::Cancelled) => {
            println!("Cancelled");
            Ok(EXIT_INCONCLUSIVE)
        }
        Err(e) => Err(e.into()),
    }
}

async fn read_code(cmd: &opt::SubmitSubCmd) -> anyhow::Result<String> {
    tokio::fs::read_to_string(&cmd.code)
        .await
        .with_context(|| format!("reading source file {}", cmd.code.display()))
}

fn progress_line(ev: &ProgressEvent) -> String {
    format!(
        "[{}/{}] {}",
        ev.judge_case_num,
        ev.accept_num,
        ev.commit_result.label()
    )
}

fn print_progress(ev: &ProgressEvent) -> anyhow::Result<()> {
    if !ev.finish {
        println!("{}", progress_line(ev));
    }
    Ok(())
}

fn handle_ctrl_c(cancel: &CancellationToken) {
    if !CTRL_C.swap(true, Ordering::SeqCst) {
        tracing::warn!("Cancelling submission... Press Ctrl-C again to force quit.");
        cancel.cancel();
    } else {
        tracing::error!("Force quit!");
        exit(101);
    }
}
