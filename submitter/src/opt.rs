use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(name = "oj-submit", version, about = "Submit code to the judge and follow the result")]
pub struct Opts {
    #[clap(subcommand)]
    pub cmd: SubCmd,

    #[clap(flatten)]
    pub opt: GlobalOpts,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Configuration file, defaults to `<config dir>/oj-submitter/config.toml`
    #[clap(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// The judge's host (include port if needed)
    #[clap(long, global = true)]
    pub host: Option<String>,

    /// Connect with https
    #[clap(long, global = true)]
    pub ssl: bool,

    /// Access token
    #[clap(long, short, global = true)]
    pub token: Option<String>,

    /// Log filter used when `RUST_LOG` is not set
    #[clap(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCmd {
    /// Judge the code against the problem's test data
    #[clap(name = "submit")]
    Submit(SubmitSubCmd),

    /// Judge the code against your own test cases
    #[clap(name = "self-test")]
    SelfTest(SelfTestSubCmd),
}

#[derive(Args, Debug, Clone)]
pub struct SubmitSubCmd {
    /// Id of the problem
    #[clap(long, short)]
    pub question: i64,

    /// Id of the language to judge the code in
    #[clap(long, short)]
    pub language: i64,

    /// Source file to submit
    #[clap(name = "code-file")]
    pub code: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SelfTestSubCmd {
    #[clap(flatten)]
    pub submission: SubmitSubCmd,

    /// A test case as `<input-file>:<expected-output-file>`. May be repeated;
    /// cases run in the given order.
    #[clap(long = "case", value_name = "IN:OUT", required = true)]
    pub cases: Vec<CasePaths>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasePaths {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl std::str::FromStr for CasePaths {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((i, o)) if !i.is_empty() && !o.is_empty() => Ok(CasePaths {
                input: i.into(),
                output: o.into(),
            }),
            _ => Err(format!("expected `<input-file>:<output-file>`, got `{}`", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_self_test() {
        let opts = Opts::try_parse_from([
            "oj-submit",
            "self-test",
            "-q",
            "12",
            "-l",
            "3",
            "main.cpp",
            "--case",
            "1.in:1.out",
            "--case",
            "2.in:2.out",
            "--token",
            "abc",
        ])
        .unwrap();
        assert_eq!(opts.opt.token.as_deref(), Some("abc"));
        match opts.cmd {
            SubCmd::SelfTest(cmd) => {
                assert_eq!(cmd.submission.question, 12);
                assert_eq!(cmd.submission.language, 3);
                assert_eq!(
                    cmd.cases,
                    vec![
                        CasePaths {
                            input: "1.in".into(),
                            output: "1.out".into()
                        },
                        CasePaths {
                            input: "2.in".into(),
                            output: "2.out".into()
                        },
                    ]
                );
            }
            other => panic!("unexpected subcommand {:?}", other),
        }
    }

    #[test]
    fn reject_malformed_case() {
        assert!("only-input".parse::<CasePaths>().is_err());
        assert!(":out".parse::<CasePaths>().is_err());
    }
}
