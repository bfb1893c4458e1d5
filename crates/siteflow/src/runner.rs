//! Pipeline runner
//!
//! Executes a [`PipelineDefinition`]: synth, the shared certificate, then
//! each stage's steps in order. A stage stops at its first failing step and
//! the run stops at the first stage that did not deploy. Nothing is rolled
//! back.

use crate::approval::{ApprovalDecision, Approver};
use crate::error::{Result, RunError};
use crate::executor::CommandExecutor;
use crate::progress::StepProgress;
use siteflow_cloud::{
    CloudError, CloudProvider, DeliveryProvider, RetryConfig, SiteState, StackConfig, StackSet,
    StackState, StageStatus, StateManager,
};
use siteflow_core::{
    BuildStep, DeployStep, HostedZone, InvalidateStep, PipelineDefinition, PipelineStage,
    SiteError, StackTemplate, StageName, StepKind, TemplateFormat,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Prefix marking a stage variable whose value lives in the parameter store
pub const PARAMETER_PREFIX: &str = "ssm:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Deployed,
    Rejected { reason: String },
    Failed { step: String, error: String },
}

impl StageOutcome {
    pub fn is_deployed(&self) -> bool {
        matches!(self, StageOutcome::Deployed)
    }
}

impl std::fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageOutcome::Deployed => write!(f, "deployed"),
            StageOutcome::Rejected { reason } => write!(f, "rejected: {reason}"),
            StageOutcome::Failed { step, error } => write!(f, "failed at {step}: {error}"),
        }
    }
}

/// Outcome of every stage that ran, in order
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub templates: Vec<PathBuf>,
    pub stages: Vec<(StageName, StageOutcome)>,
}

impl RunSummary {
    /// True when every stage in the pipeline deployed
    pub fn is_success(&self, expected_stages: usize) -> bool {
        self.stages.len() == expected_stages && self.stages.iter().all(|(_, o)| o.is_deployed())
    }
}

/// Resolve the hosted zone for the apex domain, or take an explicit id
pub async fn lookup_hosted_zone(
    delivery: &dyn DeliveryProvider,
    apex_domain: &str,
    zone_id: Option<&str>,
) -> Result<HostedZone> {
    if let Some(id) = zone_id {
        return Ok(HostedZone::new(id, apex_domain));
    }

    match delivery.find_hosted_zone(apex_domain).await? {
        Some(record) => Ok(HostedZone::new(record.id, record.name)),
        None => Err(SiteError::HostedZoneNotFound(apex_domain.to_string()).into()),
    }
}

/// Provider-facing form of a rendered template
pub fn stack_config(template: &StackTemplate) -> StackConfig {
    StackConfig::new(
        template.stack_name.clone(),
        template.environment.region.clone(),
        template.body(),
    )
}

/// Render every template of a definition into `out_dir`
pub async fn write_templates(
    definition: &PipelineDefinition,
    out_dir: &Path,
    format: TemplateFormat,
) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(out_dir).await?;

    let mut written = Vec::new();
    for template in definition.templates() {
        let path = out_dir.join(template.file_name(format));
        tokio::fs::write(&path, template.render(format)?).await?;
        written.push(path);
    }

    tracing::info!(templates = written.len(), dir = %out_dir.display(), "synth complete");
    Ok(written)
}

pub struct PipelineRunner {
    definition: PipelineDefinition,
    cloud: Arc<dyn CloudProvider>,
    delivery: Arc<dyn DeliveryProvider>,
    executor: Arc<dyn CommandExecutor>,
    approver: Arc<dyn Approver>,
    state: StateManager,
    project_root: PathBuf,
    frontend_dir: PathBuf,
    retry: RetryConfig,
    format: TemplateFormat,
    run_synth_commands: bool,
    show_progress: bool,
}

impl PipelineRunner {
    pub fn new(
        definition: PipelineDefinition,
        cloud: Arc<dyn CloudProvider>,
        delivery: Arc<dyn DeliveryProvider>,
        executor: Arc<dyn CommandExecutor>,
        approver: Arc<dyn Approver>,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        let project_root = project_root.into();
        Self {
            definition,
            cloud,
            delivery,
            executor,
            approver,
            state: StateManager::new(&project_root),
            frontend_dir: project_root.clone(),
            project_root,
            retry: RetryConfig::default(),
            format: TemplateFormat::Json,
            run_synth_commands: true,
            show_progress: true,
        }
    }

    /// Local checkout the build step runs in
    pub fn with_frontend_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.frontend_dir = dir.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_format(mut self, format: TemplateFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_synth_commands(mut self, enabled: bool) -> Self {
        self.run_synth_commands = enabled;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    fn progress(&self, label: &str) -> Option<StepProgress> {
        self.show_progress.then(|| StepProgress::new(label))
    }

    /// Directory rendered templates are written to
    pub fn synth_dir(&self) -> PathBuf {
        self.project_root.join(&self.definition.synth.output_dir)
    }

    /// Run the synth commands, then render every template
    pub async fn run_synth(&self) -> Result<Vec<PathBuf>> {
        if self.run_synth_commands {
            for command in &self.definition.synth.commands {
                let progress = self.progress(command);
                let result = self
                    .executor
                    .run(command, &self.project_root, &BTreeMap::new())
                    .await;
                finish(progress.as_ref(), command, &result);
                result?;
            }
        }

        write_templates(&self.definition, &self.synth_dir(), self.format).await
    }

    /// Provision the shared certificate stack. Failure blocks every stage.
    pub async fn run_certificate(&self) -> Result<()> {
        let template = self.definition.certificate.template();
        let label = format!("certificate {}", template.stack_name);
        let progress = self.progress(&label);
        let result = self.provision(std::slice::from_ref(&template)).await;
        finish(progress.as_ref(), &label, &result);
        result.map(|_| ())
    }

    /// Plan and apply templates in order, returning their live state
    async fn provision(
        &self,
        templates: &[StackTemplate],
    ) -> Result<Vec<StackState>> {
        let stacks: StackSet = templates.iter().map(stack_config).collect();

        let plan = self.cloud.plan(&stacks).await?;
        tracing::info!(summary = %plan.summary(), "planned");

        if plan.has_changes {
            let result = self.cloud.apply(&plan).await?;
            if !result.is_success() {
                let error = result.first_error().unwrap_or("apply failed").to_string();
                return Err(CloudError::ApiError(error).into());
            }
        }

        let live = self.cloud.get_state(stacks.as_slice()).await?;
        Ok(stacks
            .iter()
            .filter_map(|s| live.get(&s.stack_name).cloned())
            .collect())
    }

    /// Execute one stage's steps in order
    pub async fn run_stage(&self, stage: &PipelineStage, state: &mut SiteState) -> StageOutcome {
        let name = stage.name();
        state
            .stage_mut(name.as_str())
            .set_status(StageStatus::InProgress, None);
        tracing::info!(stage = %name, "stage started");

        for step in &stage.steps {
            let result = match &step.kind {
                StepKind::ManualApproval(approval) => {
                    match self.approver.request(name, approval).await {
                        ApprovalDecision::Approved => Ok(()),
                        ApprovalDecision::Rejected(reason) => {
                            tracing::info!(stage = %name, %reason, "stage rejected");
                            state
                                .stage_mut(name.as_str())
                                .set_status(StageStatus::Rejected, Some(reason.clone()));
                            return StageOutcome::Rejected { reason };
                        }
                    }
                }
                StepKind::Build(build) => {
                    let progress = self.progress(&step.id);
                    let result = self.build(build).await;
                    finish(progress.as_ref(), &step.id, &result);
                    result
                }
                StepKind::Deploy(deploy) => {
                    let progress = self.progress(&step.id);
                    let result = self.deploy(stage, deploy, state).await;
                    finish(progress.as_ref(), &step.id, &result);
                    result
                }
                StepKind::Invalidate(invalidate) => {
                    let progress = self.progress(&step.id);
                    let result = self.invalidate(stage, invalidate, state).await;
                    finish(progress.as_ref(), &step.id, &result);
                    result.map(|_| ())
                }
            };

            if let Err(e) = result {
                let error = e.to_string();
                tracing::error!(stage = %name, step = %step.id, %error, "step failed");
                state
                    .stage_mut(name.as_str())
                    .set_status(StageStatus::Failed, Some(format!("{}: {error}", step.id)));
                return StageOutcome::Failed {
                    step: step.id.clone(),
                    error,
                };
            }
        }

        state
            .stage_mut(name.as_str())
            .set_status(StageStatus::Deployed, None);
        tracing::info!(stage = %name, "stage deployed");
        StageOutcome::Deployed
    }

    /// Synth, certificate, then every stage in order under the state lock
    pub async fn run_all(&self) -> Result<RunSummary> {
        let lock = self.state.acquire_lock().await?;
        let mut state = self.state.load().await?;
        let mut summary = RunSummary {
            templates: self.run_synth().await?,
            ..Default::default()
        };

        self.run_certificate().await?;

        for stage in &self.definition.stages {
            // Stop rather than race a run that took over the lock
            lock.refresh().await?;
            let outcome = self.run_stage(stage, &mut state).await;
            self.state.save(&state).await?;

            let deployed = outcome.is_deployed();
            summary.stages.push((stage.name(), outcome));
            if !deployed {
                break;
            }
        }

        lock.release().await?;
        Ok(summary)
    }

    /// Run a single stage. The certificate must already exist.
    pub async fn deploy_stage(&self, name: StageName) -> Result<StageOutcome> {
        let stage = self
            .definition
            .stage(name)
            .ok_or_else(|| RunError::UnknownStage(name.to_string()))?;

        let lock = self.state.acquire_lock().await?;
        let mut state = self.state.load().await?;
        let outcome = self.run_stage(stage, &mut state).await;
        self.state.save(&state).await?;
        lock.release().await?;
        Ok(outcome)
    }

    /// Invalidate a stage's distribution without redeploying, returning the
    /// invalidation id
    pub async fn invalidate_stage(&self, name: StageName) -> Result<String> {
        let stage = self
            .definition
            .stage(name)
            .ok_or_else(|| RunError::UnknownStage(name.to_string()))?;
        let step = stage
            .steps
            .iter()
            .find_map(|s| match &s.kind {
                StepKind::Invalidate(invalidate) => Some(invalidate),
                _ => None,
            })
            .ok_or_else(|| RunError::UnknownStage(name.to_string()))?;

        let lock = self.state.acquire_lock().await?;
        let mut state = self.state.load().await?;
        let result = self.invalidate(stage, step, &mut state).await;
        self.state.save(&state).await?;
        lock.release().await?;
        result
    }

    /// Stage variables with parameter-store references replaced by values
    async fn resolve_env(&self, env: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
        let mut resolved = BTreeMap::new();
        for (key, value) in env {
            let value = match value.strip_prefix(PARAMETER_PREFIX) {
                Some(parameter) => {
                    tracing::debug!(%key, parameter, "resolving parameter");
                    self.delivery.get_parameter(parameter).await?
                }
                None => value.clone(),
            };
            resolved.insert(key.clone(), value);
        }
        Ok(resolved)
    }

    async fn build(&self, build: &BuildStep) -> Result<()> {
        let env = self.resolve_env(&build.env).await?;
        for command in build.install_commands.iter().chain(&build.commands) {
            self.executor.run(command, &self.frontend_dir, &env).await?;
        }
        Ok(())
    }

    async fn deploy(
        &self,
        stage: &PipelineStage,
        deploy: &DeployStep,
        state: &mut SiteState,
    ) -> Result<()> {
        let templates: Vec<_> = stage
            .templates()
            .into_iter()
            .filter(|t| deploy.stacks.contains(&t.stack_name))
            .collect();

        let stacks = self.provision(&templates).await?;
        let record = state.stage_mut(stage.name().as_str());
        for stack in stacks {
            record.record_stack(stack);
        }

        let source_dir = self.frontend_dir.join(&deploy.source_dir);
        self.delivery.sync_assets(&source_dir, &deploy.bucket).await?;
        Ok(())
    }

    async fn invalidate(
        &self,
        stage: &PipelineStage,
        invalidate: &InvalidateStep,
        state: &mut SiteState,
    ) -> Result<String> {
        let region = &stage.stage.hosting.environment.region;
        let outputs = self
            .delivery
            .stack_outputs(&invalidate.stack_name, region)
            .await?;
        let distribution_id =
            outputs
                .get(&invalidate.output_key)
                .ok_or_else(|| CloudError::OutputNotFound {
                    stack: invalidate.stack_name.clone(),
                    key: invalidate.output_key.clone(),
                })?;

        let delivery = &self.delivery;
        let paths = invalidate.paths.as_slice();
        let invalidation_id = self
            .retry
            .run("create-invalidation", || {
                delivery.create_invalidation(distribution_id, paths)
            })
            .await?;

        let record = state.stage_mut(stage.name().as_str());
        record.distribution_id = Some(distribution_id.clone());
        record.last_invalidation = Some(invalidation_id.clone());
        Ok(invalidation_id)
    }
}

fn finish<T, E: std::fmt::Display>(
    progress: Option<&StepProgress>,
    label: &str,
    result: &std::result::Result<T, E>,
) {
    if let Some(progress) = progress {
        match result {
            Ok(_) => progress.finish_success(label),
            Err(e) => progress.finish_error(label, &e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use siteflow_cloud::{
        Action, ActionType, ApplyResult, AuthStatus, HostedZoneRecord, Plan, ProviderState,
        StackStatus,
    };
    use siteflow_core::{
        ApprovalStep, DISTRIBUTION_ID_OUTPUT, SiteConfig, StageParams, StageRegistry,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct MockCloud {
        calls: Mutex<Vec<String>>,
        fail_stack: Option<String>,
    }

    #[async_trait]
    impl CloudProvider for MockCloud {
        fn name(&self) -> &str {
            "mock"
        }

        fn display_name(&self) -> &str {
            "Mock"
        }

        async fn check_auth(&self) -> siteflow_cloud::Result<AuthStatus> {
            Ok(AuthStatus::ok("tester"))
        }

        async fn get_state(&self, stacks: &[StackConfig]) -> siteflow_cloud::Result<ProviderState> {
            let mut state = ProviderState::new();
            for stack in stacks {
                state.add(
                    StackState::new(&stack.stack_name, &stack.region, StackStatus::Complete)
                        .with_outputs([(
                            DISTRIBUTION_ID_OUTPUT.to_string(),
                            format!("E-{}", stack.stack_name),
                        )]),
                );
            }
            Ok(state)
        }

        async fn plan(&self, desired: &StackSet) -> siteflow_cloud::Result<Plan> {
            Ok(Plan::new(
                desired
                    .iter()
                    .map(|s| {
                        Action::new(
                            ActionType::Create,
                            &s.stack_name,
                            &s.region,
                            Some(s.template.clone()),
                        )
                    })
                    .collect(),
            ))
        }

        async fn apply(&self, plan: &Plan) -> siteflow_cloud::Result<ApplyResult> {
            let mut result = ApplyResult::new();
            for action in &plan.actions {
                self.calls
                    .lock()
                    .unwrap()
                    .push(format!("apply {}", action.stack_name));
                if self.fail_stack.as_deref() == Some(action.stack_name.as_str()) {
                    result.add_failure(action.id.clone(), "ROLLBACK_COMPLETE".to_string());
                    break;
                }
                result.add_success(action.id.clone(), "ok".to_string());
            }
            Ok(result)
        }
    }

    #[derive(Default)]
    struct MockDelivery {
        calls: Mutex<Vec<String>>,
        missing_distribution: bool,
        invalidation_failures: AtomicU32,
        parameters: HashMap<String, String>,
    }

    #[async_trait]
    impl DeliveryProvider for MockDelivery {
        async fn stack_outputs(
            &self,
            stack_name: &str,
            _region: &str,
        ) -> siteflow_cloud::Result<HashMap<String, String>> {
            let mut outputs = HashMap::new();
            if !self.missing_distribution {
                outputs.insert(DISTRIBUTION_ID_OUTPUT.to_string(), format!("E-{stack_name}"));
            }
            Ok(outputs)
        }

        async fn sync_assets(&self, source_dir: &Path, bucket: &str) -> siteflow_cloud::Result<()> {
            let dir = source_dir.file_name().unwrap().to_string_lossy().to_string();
            self.calls
                .lock()
                .unwrap()
                .push(format!("sync {dir} {bucket}"));
            Ok(())
        }

        async fn create_invalidation(
            &self,
            distribution_id: &str,
            paths: &[String],
        ) -> siteflow_cloud::Result<String> {
            let remaining = self.invalidation_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.invalidation_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(CloudError::ApiError("Throttling".to_string()));
            }
            self.calls
                .lock()
                .unwrap()
                .push(format!("invalidate {distribution_id} {}", paths.join(",")));
            Ok(format!("I-{distribution_id}"))
        }

        async fn find_hosted_zone(
            &self,
            domain: &str,
        ) -> siteflow_cloud::Result<Option<HostedZoneRecord>> {
            Ok((domain == "example.com").then(|| HostedZoneRecord {
                id: "/hostedzone/Z1".to_string(),
                name: "example.com.".to_string(),
            }))
        }

        async fn get_parameter(&self, name: &str) -> siteflow_cloud::Result<String> {
            self.parameters
                .get(name)
                .cloned()
                .ok_or_else(|| CloudError::ApiError(format!("ParameterNotFound: {name}")))
        }
    }

    #[derive(Default)]
    struct MockExecutor {
        calls: Mutex<Vec<(String, BTreeMap<String, String>)>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl CommandExecutor for MockExecutor {
        async fn run(&self, command: &str, _cwd: &Path, env: &BTreeMap<String, String>) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((command.to_string(), env.clone()));
            if self.fail_on.as_deref() == Some(command) {
                return Err(RunError::CommandFailed {
                    command: command.to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "build broke".to_string(),
                });
            }
            Ok(())
        }
    }

    struct Deny;

    #[async_trait]
    impl Approver for Deny {
        async fn request(&self, _stage: StageName, _step: &ApprovalStep) -> ApprovalDecision {
            ApprovalDecision::Rejected("not today".to_string())
        }
    }

    fn definition() -> PipelineDefinition {
        let mut config = SiteConfig::new("ExampleSite", "example.com", "123456789012");
        config.source.owner = "example-org".to_string();
        config.source.repo = "example-site-infra".to_string();
        config.source.frontend_repo = "example-portal".to_string();

        let mut dev = StageParams::with_bucket("dev-assets");
        dev.variables
            .insert("VITE_API_KEY".to_string(), "ssm:/example/dev/api-key".to_string());
        let config = config
            .with_stage(StageName::Dev, dev)
            .with_stage(StageName::Prod, StageParams::with_bucket("prod-assets"));

        let registry = StageRegistry::from_config(&config).unwrap();
        PipelineDefinition::define(&config, &registry, &HostedZone::new("Z1", "example.com"))
            .unwrap()
    }

    struct Harness {
        cloud: Arc<MockCloud>,
        delivery: Arc<MockDelivery>,
        executor: Arc<MockExecutor>,
        runner: PipelineRunner,
        _dir: tempfile::TempDir,
    }

    fn harness(
        cloud: MockCloud,
        delivery: MockDelivery,
        executor: MockExecutor,
        approver: Arc<dyn Approver>,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let cloud = Arc::new(cloud);
        let delivery = Arc::new(delivery);
        let executor = Arc::new(executor);
        let runner = PipelineRunner::new(
            definition(),
            cloud.clone(),
            delivery.clone(),
            executor.clone(),
            approver,
            dir.path(),
        )
        .with_retry(RetryConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..Default::default()
        })
        .with_progress(false);

        Harness {
            cloud,
            delivery,
            executor,
            runner,
            _dir: dir,
        }
    }

    fn delivery_with_key() -> MockDelivery {
        let mut delivery = MockDelivery::default();
        delivery
            .parameters
            .insert("/example/dev/api-key".to_string(), "secret".to_string());
        delivery
    }

    fn approve() -> Arc<dyn Approver> {
        Arc::new(crate::approval::AutoApprover)
    }

    #[tokio::test]
    async fn test_run_all_deploys_stages_in_order() {
        let h = harness(
            MockCloud::default(),
            delivery_with_key(),
            MockExecutor::default(),
            approve(),
        );

        let summary = h.runner.run_all().await.unwrap();
        assert!(summary.is_success(2));
        assert_eq!(summary.templates.len(), 3);
        for path in &summary.templates {
            assert!(path.exists(), "{} not written", path.display());
        }

        let applied = h.cloud.calls.lock().unwrap().clone();
        assert_eq!(
            applied,
            vec![
                "apply ExampleSitePipelineStack",
                "apply dev-ExampleSiteCloudFrontStack-dev",
                "apply prod-ExampleSiteCloudFrontStack-prod",
            ]
        );

        let delivered = h.delivery.calls.lock().unwrap().clone();
        assert_eq!(
            delivered,
            vec![
                "sync dist dev-assets",
                "invalidate E-dev-ExampleSiteCloudFrontStack-dev /*",
                "sync dist prod-assets",
                "invalidate E-prod-ExampleSiteCloudFrontStack-prod /*",
            ]
        );
    }

    #[tokio::test]
    async fn test_synth_writes_requested_format() {
        let h = harness(
            MockCloud::default(),
            MockDelivery::default(),
            MockExecutor::default(),
            approve(),
        );
        let runner = h
            .runner
            .with_format(siteflow_core::TemplateFormat::Yaml)
            .with_synth_commands(false);

        let templates = runner.run_synth().await.unwrap();
        assert_eq!(templates.len(), 3);
        for path in &templates {
            assert_eq!(path.extension().and_then(|e| e.to_str()), Some("yaml"));
            assert!(path.starts_with(runner.synth_dir()));
        }
        assert!(h.executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outputs_recorded_in_state() {
        let h = harness(
            MockCloud::default(),
            delivery_with_key(),
            MockExecutor::default(),
            approve(),
        );
        h.runner.run_all().await.unwrap();

        let state = StateManager::new(&h.runner.project_root).load().await.unwrap();
        let dev = state.stage("dev").unwrap();
        assert_eq!(dev.status, StageStatus::Deployed);
        assert_eq!(
            dev.distribution_id.as_deref(),
            Some("E-dev-ExampleSiteCloudFrontStack-dev")
        );
        assert_eq!(
            dev.last_invalidation.as_deref(),
            Some("I-E-dev-ExampleSiteCloudFrontStack-dev")
        );
        let stack = &dev.stacks["dev-ExampleSiteCloudFrontStack-dev"];
        assert_eq!(stack.status, StackStatus::Complete);
        assert!(stack.outputs.contains_key(DISTRIBUTION_ID_OUTPUT));
    }

    #[tokio::test]
    async fn test_rejection_stops_prod_and_keeps_dev() {
        let h = harness(
            MockCloud::default(),
            delivery_with_key(),
            MockExecutor::default(),
            Arc::new(Deny),
        );

        let summary = h.runner.run_all().await.unwrap();
        assert!(!summary.is_success(2));
        assert_eq!(summary.stages[0], (StageName::Dev, StageOutcome::Deployed));
        assert_eq!(
            summary.stages[1],
            (
                StageName::Prod,
                StageOutcome::Rejected {
                    reason: "not today".to_string()
                }
            )
        );

        let applied = h.cloud.calls.lock().unwrap().clone();
        assert!(!applied.iter().any(|c| c.contains("prod")));

        let state = StateManager::new(&h.runner.project_root).load().await.unwrap();
        assert_eq!(state.stage("dev").unwrap().status, StageStatus::Deployed);
        assert_eq!(state.stage("prod").unwrap().status, StageStatus::Rejected);
    }

    #[tokio::test]
    async fn test_build_failure_halts_stage_and_pipeline() {
        let executor = MockExecutor {
            fail_on: Some("npm run build".to_string()),
            ..Default::default()
        };
        let h = harness(MockCloud::default(), delivery_with_key(), executor, approve())
            .with_no_synth_commands();

        let summary = h.runner.run_all().await.unwrap();
        assert_eq!(summary.stages.len(), 1);
        assert!(matches!(
            &summary.stages[0].1,
            StageOutcome::Failed { step, .. } if step == "Build-FrontEnd-dev"
        ));

        // Only the certificate was provisioned
        assert_eq!(
            h.cloud.calls.lock().unwrap().clone(),
            vec!["apply ExampleSitePipelineStack"]
        );
        assert!(h.delivery.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_failure_skips_sync_and_invalidation() {
        let cloud = MockCloud {
            fail_stack: Some("dev-ExampleSiteCloudFrontStack-dev".to_string()),
            ..Default::default()
        };
        let h = harness(cloud, delivery_with_key(), MockExecutor::default(), approve());

        let summary = h.runner.run_all().await.unwrap();
        assert!(matches!(
            &summary.stages[0].1,
            StageOutcome::Failed { step, error }
                if step == "Deploy-FrontEnd-dev" && error.contains("ROLLBACK_COMPLETE")
        ));
        assert!(h.delivery.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_certificate_failure_is_fatal() {
        let cloud = MockCloud {
            fail_stack: Some("ExampleSitePipelineStack".to_string()),
            ..Default::default()
        };
        let h = harness(cloud, delivery_with_key(), MockExecutor::default(), approve());

        assert!(h.runner.run_all().await.is_err());
        assert_eq!(h.cloud.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_all_refuses_while_locked() {
        let h = harness(
            MockCloud::default(),
            delivery_with_key(),
            MockExecutor::default(),
            approve(),
        );
        let held = StateManager::new(&h.runner.project_root)
            .acquire_lock()
            .await
            .unwrap();

        let err = h.runner.run_all().await.unwrap_err();
        assert!(matches!(err, RunError::Cloud(CloudError::LockError(_))));
        assert!(h.cloud.calls.lock().unwrap().is_empty());

        held.release().await.unwrap();
        assert!(h.runner.run_all().await.unwrap().is_success(2));
    }

    #[tokio::test]
    async fn test_invalidation_retried_until_success() {
        let delivery = delivery_with_key();
        delivery.invalidation_failures.store(2, Ordering::SeqCst);
        let h = harness(MockCloud::default(), delivery, MockExecutor::default(), approve());

        let outcome = h.runner.deploy_stage(StageName::Dev).await.unwrap();
        assert_eq!(outcome, StageOutcome::Deployed);
    }

    #[tokio::test]
    async fn test_invalidation_exhausted_fails_stage() {
        let delivery = delivery_with_key();
        delivery.invalidation_failures.store(5, Ordering::SeqCst);
        let h = harness(MockCloud::default(), delivery, MockExecutor::default(), approve());

        let outcome = h.runner.deploy_stage(StageName::Dev).await.unwrap();
        assert!(matches!(
            outcome,
            StageOutcome::Failed { step, error }
                if step == "InvalidateCache-dev" && error.contains("Throttling")
        ));

        // Deployed resources stay in place
        assert_eq!(
            h.cloud.calls.lock().unwrap().clone(),
            vec!["apply dev-ExampleSiteCloudFrontStack-dev"]
        );
    }

    #[tokio::test]
    async fn test_missing_distribution_id_fails_invalidate_step() {
        let delivery = MockDelivery {
            missing_distribution: true,
            ..delivery_with_key()
        };
        let h = harness(MockCloud::default(), delivery, MockExecutor::default(), approve());

        let outcome = h.runner.deploy_stage(StageName::Dev).await.unwrap();
        assert!(matches!(
            outcome,
            StageOutcome::Failed { step, error }
                if step == "InvalidateCache-dev" && error.contains(DISTRIBUTION_ID_OUTPUT)
        ));
    }

    #[tokio::test]
    async fn test_build_env_resolves_parameters() {
        let h = harness(
            MockCloud::default(),
            delivery_with_key(),
            MockExecutor::default(),
            approve(),
        );
        h.runner.deploy_stage(StageName::Dev).await.unwrap();

        let calls = h.executor.calls.lock().unwrap().clone();
        let (command, env) = &calls[0];
        assert_eq!(command, "npm install");
        assert_eq!(env["VITE_API_KEY"], "secret");
        assert_eq!(env["REACT_APP_STAGE"], "dev");
        assert_eq!(env["CI"], "true");
    }

    #[tokio::test]
    async fn test_missing_parameter_fails_build() {
        let h = harness(
            MockCloud::default(),
            MockDelivery::default(),
            MockExecutor::default(),
            approve(),
        );

        let outcome = h.runner.deploy_stage(StageName::Dev).await.unwrap();
        assert!(matches!(
            outcome,
            StageOutcome::Failed { step, .. } if step == "Build-FrontEnd-dev"
        ));
        assert!(h.executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_hosted_zone() {
        let delivery = MockDelivery::default();

        let zone = lookup_hosted_zone(&delivery, "example.com", None).await.unwrap();
        assert_eq!(zone, HostedZone::new("Z1", "example.com"));

        let zone = lookup_hosted_zone(&delivery, "other.org", Some("Z9")).await.unwrap();
        assert_eq!(zone.id, "Z9");

        let err = lookup_hosted_zone(&delivery, "other.org", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::Site(SiteError::HostedZoneNotFound(domain)) if domain == "other.org"
        ));
    }

    impl Harness {
        fn with_no_synth_commands(mut self) -> Self {
            self.runner.run_synth_commands = false;
            self
        }
    }
}
