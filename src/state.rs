use crate::agent::AgentClassifier;
use crate::config::{AdmissionConfig, Args};
use crate::error::{ConfigError, StartupError};
use crate::rate_limit::AdmissionLimiter;
use crate::upstream::Upstream;

// app's shared state, built once at startup and handed to the router
pub struct AppState {
    pub config: AdmissionConfig,
    pub limiter: AdmissionLimiter,
    pub classifier: AgentClassifier,
    pub upstream: Option<Upstream>, // storefront to forward admitted requests to
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(
        config: AdmissionConfig,
        classifier: AgentClassifier,
        upstream: Option<Upstream>,
        admin_token: Option<String>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            limiter: AdmissionLimiter::new(&config),
            config,
            classifier,
            upstream,
            admin_token: admin_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn from_args(args: &Args) -> Result<Self, StartupError> {
        let config = args.admission_config()?;
        let classifier = AgentClassifier::new(&args.agent_deny, &args.agent_allow);
        let upstream = args
            .upstream
            .as_deref()
            .map(|url| Upstream::new(reqwest::Client::new(), url))
            .transpose()?;

        Ok(Self::new(config, classifier, upstream, args.admin_token.clone())?)
    }
}
