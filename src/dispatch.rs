use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::http::reqwest::default_dyn_transport;
use crate::provider::{
    ChatStrategy, ClaudeStrategy, DynStrategy, InstancesStrategy, PromptStrategy,
};
use crate::types::{BackendTarget, DispatchRequest, Response};

/// Predicate deciding whether a route accepts a request.
///
/// The second argument is the model identifier, already lower-cased.
pub type RoutePredicate = Arc<dyn Fn(&DispatchRequest, &str) -> bool + Send + Sync>;

/// One `(predicate, strategy)` entry of the dispatch table.
#[derive(Clone)]
pub struct Route {
    name: &'static str,
    predicate: RoutePredicate,
    strategy: DynStrategy,
}

impl Route {
    pub fn new<F>(name: &'static str, predicate: F, strategy: DynStrategy) -> Self
    where
        F: Fn(&DispatchRequest, &str) -> bool + Send + Sync + 'static,
    {
        Self {
            name,
            predicate: Arc::new(predicate),
            strategy,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn strategy(&self) -> &DynStrategy {
        &self.strategy
    }

    fn matches(&self, request: &DispatchRequest, model_lower: &str) -> bool {
        (self.predicate)(request, model_lower)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

/// The built-in table, evaluated top to bottom.
///
/// 1. messages present: chat-style, whatever the model;
/// 2. model mentions `claude` or `anthropic`: claude-style;
/// 3. model starts with `ds`: batch-instances;
/// 4. prompt present: free-form prompt.
pub fn default_routes() -> Vec<Route> {
    vec![
        Route::new(
            "chat",
            |request, _| request.messages.is_some(),
            Arc::new(ChatStrategy::new()),
        ),
        Route::new(
            "claude",
            |_, model| model.contains("claude") || model.contains("anthropic"),
            Arc::new(ClaudeStrategy::new()),
        ),
        // Also matches unrelated names that happen to start with "ds".
        Route::new(
            "instances",
            |_, model| model.starts_with("ds"),
            Arc::new(InstancesStrategy::new()),
        ),
        Route::new(
            "prompt",
            |request, _| request.prompt.is_some(),
            Arc::new(PromptStrategy::new()),
        ),
    ]
}

/// 调用入口 负责选择策略并维护已注册的后端句柄
pub struct Dispatcher {
    transport: DynHttpTransport,
    routes: Vec<Route>,
    targets: HashMap<String, BackendTarget>,
}

impl Dispatcher {
    /// 使用默认路由表创建
    pub fn new(transport: DynHttpTransport) -> Self {
        Self::builder(transport).default_routes().build()
    }

    /// 创建 Builder 便于自定义路由与句柄
    pub fn builder(transport: DynHttpTransport) -> DispatcherBuilder {
        DispatcherBuilder {
            transport,
            routes: Vec::new(),
            targets: HashMap::new(),
        }
    }

    /// 按顺序选出第一条匹配的路由 不做任何 I/O 无请求形态或无匹配时返回 InvalidConfig
    pub fn select(&self, request: &DispatchRequest, model: &str) -> Result<&Route, LLMError> {
        if !request.has_shape() {
            return Err(LLMError::invalid_config(
                "request",
                "supply messages, a prompt or instances",
            ));
        }

        let model_lower = model.to_lowercase();
        self.routes
            .iter()
            .find(|route| route.matches(request, &model_lower))
            .ok_or_else(|| {
                LLMError::invalid_config(
                    "request",
                    format!("no usable request shape for model {model}: messages or a prompt is required"),
                )
            })
    }

    /// 为 target.model 选择策略并发送请求 配置错误在访问网络前返回
    pub async fn dispatch(
        &self,
        target: &BackendTarget,
        request: DispatchRequest,
    ) -> Result<Response, LLMError> {
        let route = self.select(&request, &target.model)?;
        debug!(
            route = route.name(),
            strategy = route.strategy().name(),
            model = %target.model,
            stream = request.stream,
            "selected transport strategy"
        );
        route
            .strategy()
            .send(&*self.transport, target, &request)
            .await
    }

    /// 调用已注册句柄对应的后端
    pub async fn call(&self, handle: &str, request: DispatchRequest) -> Result<Response, LLMError> {
        let target = self.get_target(handle)?;
        self.dispatch(target, request).await
    }

    /// 返回当前已注册的句柄
    pub fn handles(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    /// 按匹配顺序返回路由名称
    pub fn route_names(&self) -> Vec<&'static str> {
        self.routes.iter().map(Route::name).collect()
    }

    fn get_target(&self, handle: &str) -> Result<&BackendTarget, LLMError> {
        self.targets
            .get(handle)
            .ok_or_else(|| LLMError::invalid_config("handle", format!("unknown backend handle: {handle}")))
    }
}

/// 负责组装路由表与句柄的 Builder
pub struct DispatcherBuilder {
    transport: DynHttpTransport,
    routes: Vec<Route>,
    targets: HashMap<String, BackendTarget>,
}

impl DispatcherBuilder {
    /// 追加一条路由 先注册者优先
    pub fn route<F>(mut self, name: &'static str, predicate: F, strategy: DynStrategy) -> Self
    where
        F: Fn(&DispatchRequest, &str) -> bool + Send + Sync + 'static,
    {
        self.routes.push(Route::new(name, predicate, strategy));
        self
    }

    /// 追加内置路由表
    pub fn default_routes(mut self) -> Self {
        self.routes.extend(default_routes());
        self
    }

    /// 注册一个句柄对应的后端
    pub fn register_target<S: Into<String>>(mut self, handle: S, target: BackendTarget) -> Self {
        self.targets.insert(handle.into(), target);
        self
    }

    /// 构建最终的 Dispatcher
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            transport: self.transport,
            routes: self.routes,
            targets: self.targets,
        }
    }
}

/// One-shot call over a fresh reqwest transport with the built-in routes.
///
/// # Examples
///
/// ```no_run
/// use llm_dispatch::{DispatchRequest, dispatch};
///
/// # async fn run() -> Result<(), llm_dispatch::LLMError> {
/// let response = dispatch(
///     "https://api.example.com/v1/generate",
///     "YOUR_KEY",
///     "ds-v3",
///     DispatchRequest::prompt("Translate: Hello"),
/// )
/// .await?;
/// println!("{:?}", response.into_complete()?);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Same as [`Dispatcher::dispatch`], plus [`LLMError::Transport`] if the HTTP client
/// cannot be created.
pub async fn dispatch(
    endpoint: &str,
    api_key: &str,
    model: &str,
    request: DispatchRequest,
) -> Result<Response, LLMError> {
    let dispatcher = Dispatcher::new(default_dyn_transport()?);
    dispatcher
        .dispatch(&BackendTarget::new(endpoint, api_key, model), request)
        .await
}
