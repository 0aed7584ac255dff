//! The HITL interceptor: the pre-tool-use coordinator that turns a resolved
//! [`agent_policy::Strategy`] into a concrete [`PermissionDecision`].

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_governance::{AiReviewer, PromptShieldClient, ShieldOutcome};
use agent_policy::{EvalContext, PolicyStore, Strategy, INTERACTIVE};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::bindings::{ExecutionContext, TurnBindings};
use crate::events::{EventEmitter, HitlEvent, TracingEventEmitter};
use crate::request::{Decision, PermissionDecision, ToolCallRequest};

const APPROVAL_TIMEOUT: Duration = Duration::from_secs(300);
const REVIEW_TIMEOUT: Duration = Duration::from_secs(30);

/// Classifies text for prompt-injection risk. A trait seam over
/// [`PromptShieldClient`] so the interceptor's tests can inject a fake
/// classifier rather than reaching a real HTTPS endpoint.
#[async_trait]
pub trait ShieldClient: Send + Sync {
    /// Classifies `text`, never failing by signature.
    async fn classify(&self, text: &str) -> ShieldOutcome;
}

#[async_trait]
impl ShieldClient for PromptShieldClient {
    async fn classify(&self, text: &str) -> ShieldOutcome {
        PromptShieldClient::classify(self, text).await
    }
}

/// Tracks one-shot senders for approvals awaiting a human response.
#[derive(Default)]
struct PendingApprovals {
    chat: Mutex<HashMap<String, oneshot::Sender<bool>>>,
    bot: Mutex<Option<oneshot::Sender<bool>>>,
}

/// Coordinates policy-gated tool execution for a single session: resolves
/// a strategy for every proposed tool call and, when that strategy demands
/// it, raises and waits on an approval prompt.
pub struct HitlInterceptor {
    store: Arc<PolicyStore>,
    reviewer: Option<Arc<AiReviewer>>,
    shield: Option<Arc<dyn ShieldClient>>,
    whitelist: BTreeSet<String>,
    model: String,
    execution_context: ExecutionContext,
    bindings: Mutex<Option<TurnBindings>>,
    pending: PendingApprovals,
    default_emitter: Arc<dyn EventEmitter>,
}

impl HitlInterceptor {
    /// Builds an interceptor over `store`, auto-approving any tool named in
    /// `whitelist` without consulting the engine.
    #[must_use]
    pub fn new(store: Arc<PolicyStore>, whitelist: BTreeSet<String>) -> Self {
        Self {
            store,
            reviewer: None,
            shield: None,
            whitelist,
            model: String::new(),
            execution_context: ExecutionContext::new(INTERACTIVE),
            bindings: Mutex::new(None),
            pending: PendingApprovals::default(),
            default_emitter: Arc::new(TracingEventEmitter),
        }
    }

    /// Attaches the AI reviewer used for `aitl` strategies.
    #[must_use]
    pub fn with_reviewer(mut self, reviewer: Arc<AiReviewer>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    /// Attaches the AI reviewer used for `aitl` strategies.
    pub fn set_reviewer(&mut self, reviewer: Arc<AiReviewer>) {
        self.reviewer = Some(reviewer);
    }

    /// Attaches the Prompt Shield classifier.
    #[must_use]
    pub fn with_shield(mut self, shield: Arc<dyn ShieldClient>) -> Self {
        self.shield = Some(shield);
        self
    }

    /// Attaches the Prompt Shield classifier.
    pub fn set_shield(&mut self, shield: Arc<dyn ShieldClient>) {
        self.shield = Some(shield);
    }

    /// Sets the model identifier carried on every strategy resolution.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the default execution context (used when a turn doesn't
    /// bind its own).
    #[must_use]
    pub fn with_execution_context(mut self, context: impl Into<ExecutionContext>) -> Self {
        self.execution_context = context.into();
        self
    }

    /// Overrides the emitter used when no turn binding supplies one.
    #[must_use]
    pub fn with_default_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.default_emitter = emitter;
        self
    }

    /// Binds the channel callbacks for the upcoming turn, replacing any
    /// previously bound set.
    pub fn bind_turn(&self, bindings: TurnBindings) {
        *self.lock_bindings() = Some(bindings);
    }

    /// Clears the turn's channel callbacks.
    pub fn unbind_turn(&self) {
        *self.lock_bindings() = None;
    }

    /// Completes a pending chat approval. Returns `true` iff `tool_call_id`
    /// had an outstanding approval.
    pub fn resolve_approval(&self, tool_call_id: &str, approved: bool) -> bool {
        let mut chat = self.lock_chat();
        if let Some(sender) = chat.remove(tool_call_id) {
            let _ = sender.send(approved);
            true
        } else {
            false
        }
    }

    /// Completes the single pending bot approval, if any, parsing `text`
    /// per the bot free-text convention. Returns `true` iff one was
    /// outstanding.
    pub fn resolve_bot_reply(&self, text: &str) -> bool {
        let mut bot = self.lock_bot();
        if let Some(sender) = bot.take() {
            let approved = is_affirmative(text);
            let _ = sender.send(approved);
            true
        } else {
            false
        }
    }

    /// Reports whether any approval (chat or bot) is currently outstanding.
    #[must_use]
    pub fn has_pending_approval(&self) -> bool {
        !self.lock_chat().is_empty() || self.lock_bot().is_some()
    }

    /// Resolves the permission decision for a proposed tool call.
    pub async fn on_pre_tool_use(&self, request: ToolCallRequest) -> PermissionDecision {
        if self.whitelist.contains(&request.tool_name) {
            return PermissionDecision::allow();
        }

        let bindings = self.captured_bindings();
        let emitter = bindings
            .as_ref()
            .and_then(|b| b.emit.clone())
            .unwrap_or_else(|| self.default_emitter.clone());
        let execution_context = bindings
            .as_ref()
            .and_then(|b| b.execution_context.clone())
            .unwrap_or_else(|| self.execution_context.clone());

        let mut ctx = EvalContext::new(request.tool_name.clone())
            .with_mode(execution_context.as_str().to_owned())
            .with_model(self.model.clone());
        if let Some(mcp_server) = &request.mcp_server {
            ctx = ctx.with_mcp_server(mcp_server.clone());
        }

        let strategy = self.store.resolve(&ctx);
        debug!(
            tool = %request.tool_name,
            context = execution_context.as_str(),
            ?strategy,
            "hitl strategy resolved"
        );

        let args_text = request.tool_args.to_string();

        if let Some(shield) = &self.shield {
            let outcome = shield.classify(&args_text).await;
            if outcome.blocks_fail_open() {
                warn!(tool = %request.tool_name, "prompt shield flagged tool call arguments");
                return self
                    .finish(
                        &request,
                        false,
                        "shield",
                        emitter,
                        Some("prompt shield flagged the call arguments".to_owned()),
                    )
                    .await;
            }
        }

        let approved = match strategy {
            Strategy::Allow => true,
            Strategy::Deny => {
                return self
                    .finish(&request, false, "policy", emitter, Some("denied by policy".to_owned()))
                    .await;
            }
            Strategy::Filter => match &self.shield {
                Some(shield) => !shield.classify(&args_text).await.blocks_fail_closed(),
                None => true,
            },
            Strategy::Aitl => self.dispatch_aitl(&request, &args_text, execution_context.as_str()).await,
            Strategy::Hitl => self.dispatch_hitl(&request, bindings.as_ref()).await,
            Strategy::Pitl => self.dispatch_pitl(&request, &args_text, bindings.as_ref()).await,
        };

        self.finish(&request, approved, channel_for(strategy), emitter, None).await
    }

    async fn dispatch_aitl(&self, request: &ToolCallRequest, args_text: &str, context: &str) -> bool {
        let Some(reviewer) = &self.reviewer else {
            return false;
        };
        let purpose = format!("tool call in {context} context");
        match timeout(
            REVIEW_TIMEOUT,
            reviewer.review(&request.tool_name, args_text, &purpose),
        )
        .await
        {
            Ok(verdict) => verdict.allow,
            Err(_) => {
                warn!(tool = %request.tool_name, "aitl review timed out");
                false
            }
        }
    }

    async fn dispatch_hitl(&self, request: &ToolCallRequest, bindings: Option<&TurnBindings>) -> bool {
        let chat_receiver = bindings.and_then(|b| b.emit.as_ref()).map(|emit| {
            let (sender, receiver) = oneshot::channel();
            self.lock_chat().insert(request.tool_call_id.clone(), sender);
            let emit = emit.clone();
            let event = HitlEvent::ApprovalRequest {
                tool_call_id: request.tool_call_id.clone(),
                tool_name: request.tool_name.clone(),
                args_preview: request.args_preview(),
            };
            tokio::spawn(async move { emit.emit(event).await });
            receiver
        });

        let bot_receiver = bindings.and_then(|b| b.bot_reply.as_ref()).map(|replier| {
            let (sender, receiver) = oneshot::channel();
            *self.lock_bot() = Some(sender);
            let replier = replier.clone();
            let prompt = format!(
                "Approve tool call `{}`? Reply yes or no.",
                request.tool_name
            );
            tokio::spawn(async move { replier.reply(&prompt).await });
            receiver
        });

        let result = if chat_receiver.is_none() && bot_receiver.is_none() {
            None
        } else {
            timeout(APPROVAL_TIMEOUT, race(chat_receiver, bot_receiver)).await.ok()
        };

        self.lock_chat().remove(&request.tool_call_id);
        *self.lock_bot() = None;

        matches!(result, Some(Some(true)))
    }

    async fn dispatch_pitl(
        &self,
        request: &ToolCallRequest,
        args_text: &str,
        bindings: Option<&TurnBindings>,
    ) -> bool {
        let Some(verifier) = bindings.and_then(|b| b.phone_verifier.clone()) else {
            return false;
        };
        match timeout(APPROVAL_TIMEOUT, verifier.verify(&request.tool_name, args_text)).await {
            Ok(Ok(approved)) => approved,
            Ok(Err(err)) => {
                warn!(tool = %request.tool_name, error = %err, "phone verification failed");
                false
            }
            Err(_) => {
                warn!(tool = %request.tool_name, "phone verification timed out");
                false
            }
        }
    }

    async fn finish(
        &self,
        request: &ToolCallRequest,
        approved: bool,
        channel: &'static str,
        emitter: Arc<dyn EventEmitter>,
        deny_reason: Option<String>,
    ) -> PermissionDecision {
        if let Some(reason) = deny_reason {
            emitter
                .emit(HitlEvent::ToolDenied {
                    tool_call_id: request.tool_call_id.clone(),
                    tool_name: request.tool_name.clone(),
                    reason,
                })
                .await;
        }

        emitter
            .emit(HitlEvent::ApprovalResolved {
                tool_call_id: request.tool_call_id.clone(),
                tool_name: request.tool_name.clone(),
                approved,
                channel,
            })
            .await;

        if approved {
            PermissionDecision::allow()
        } else {
            PermissionDecision::deny()
        }
    }

    fn captured_bindings(&self) -> Option<TurnBindings> {
        self.lock_bindings().clone()
    }

    fn lock_bindings(&self) -> std::sync::MutexGuard<'_, Option<TurnBindings>> {
        self.bindings.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_chat(&self) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<bool>>> {
        self.pending.chat.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_bot(&self) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<bool>>> {
        self.pending.bot.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn channel_for(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Hitl => "chat",
        Strategy::Pitl => "phone",
        Strategy::Aitl => "aitl",
        Strategy::Filter => "filter",
        Strategy::Allow | Strategy::Deny => "policy",
    }
}

fn is_affirmative(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .map(|token| matches!(token.to_ascii_lowercase().as_str(), "y" | "yes"))
        .unwrap_or(false)
}

async fn race(
    chat: Option<oneshot::Receiver<bool>>,
    bot: Option<oneshot::Receiver<bool>>,
) -> Option<bool> {
    use futures::future::pending;

    let chat_fut = async {
        match chat {
            Some(receiver) => receiver.await.ok(),
            None => pending::<Option<bool>>().await,
        }
    };
    let bot_fut = async {
        match bot {
            Some(receiver) => receiver.await.ok(),
            None => pending::<Option<bool>>().await,
        }
    };

    tokio::select! {
        result = chat_fut => result,
        result = bot_fut => result,
    }
}
