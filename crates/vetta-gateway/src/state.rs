//! Shared application state: every core service constructed once at
//! startup with explicit dependencies and injected into all handlers.

use std::sync::Arc;
use vetta_core::{
    AdminReports, CodeExecutor, ConsoleMailer, CoreConfig, EvaluationEngine, FollowUpEngine,
    HttpLlmClient, HttpSandboxClient, JdManager, LlmGateway, Mailer, NoopPlagiarismChecker,
    OnboardingManager, ProctoringIngest, SandboxGateway, SessionController, SessionLocks, Store,
};

/// SMTP when the `email` feature is on and credentials are present;
/// console logging otherwise.
#[cfg(feature = "email")]
fn build_mailer(config: &CoreConfig) -> Arc<dyn Mailer> {
    if let Some(smtp) = &config.smtp {
        match vetta_core::SmtpMailer::new(smtp) {
            Ok(mailer) => return Arc::new(mailer),
            Err(e) => tracing::warn!(error = %e, "smtp unavailable, falling back to console mail"),
        }
    }
    Arc::new(ConsoleMailer)
}

#[cfg(not(feature = "email"))]
fn build_mailer(_config: &CoreConfig) -> Arc<dyn Mailer> {
    Arc::new(ConsoleMailer)
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub jd: Arc<JdManager>,
    pub onboarding: Arc<OnboardingManager>,
    pub session: Arc<SessionController>,
    pub code: Arc<CodeExecutor>,
    pub proctoring: Arc<ProctoringIngest>,
    pub evaluation: Arc<EvaluationEngine>,
    pub followups: Arc<FollowUpEngine>,
    pub reports: Arc<AdminReports>,
}

impl AppState {
    pub fn build(config: &CoreConfig) -> Result<Self, vetta_core::EngineError> {
        let store = Arc::new(Store::open(&config.data_dir)?);
        let llm = Arc::new(LlmGateway::new(
            Arc::new(HttpLlmClient::new(&config.llm)),
            config.llm.model.clone(),
        ));
        let sandbox = SandboxGateway::new(Arc::new(HttpSandboxClient::new(&config.sandbox)));
        let locks = Arc::new(SessionLocks::new());
        let mailer = build_mailer(config);

        let evaluation = Arc::new(EvaluationEngine::new(
            store.clone(),
            llm.clone(),
            Arc::new(NoopPlagiarismChecker),
        ));
        Ok(Self {
            jd: Arc::new(JdManager::new(store.clone(), llm.clone())),
            onboarding: Arc::new(OnboardingManager::new(
                store.clone(),
                llm.clone(),
                mailer,
                config.frontend_base_url.clone(),
            )),
            session: Arc::new(SessionController::new(
                store.clone(),
                locks.clone(),
                evaluation.clone(),
            )),
            code: Arc::new(CodeExecutor::new(store.clone(), sandbox, locks)),
            proctoring: Arc::new(ProctoringIngest::new(store.clone())),
            followups: Arc::new(FollowUpEngine::new(store.clone(), llm)),
            reports: Arc::new(AdminReports::new(store.clone())),
            evaluation,
            store,
        })
    }
}
