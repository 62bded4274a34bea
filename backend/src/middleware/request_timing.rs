use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    rc::Rc,
    time::{Duration, Instant},
};
use tracing::{info, warn};

const DEFAULT_SLOW_REQUEST: Duration = Duration::from_millis(1000);

/// Logs method, path, status and latency of every request and warns when a
/// request is slower than the configured threshold.
pub struct RequestTiming {
    slow_threshold: Duration,
}

impl RequestTiming {
    pub fn new() -> Self {
        Self {
            slow_threshold: DEFAULT_SLOW_REQUEST,
        }
    }

    pub fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }
}

impl Default for RequestTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestTiming
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestTimingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTimingService {
            service: Rc::new(service),
            slow_threshold: self.slow_threshold,
        }))
    }
}

pub struct RequestTimingService<S> {
    service: Rc<S>,
    slow_threshold: Duration,
}

impl<S, B> Service<ServiceRequest> for RequestTimingService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let slow_threshold = self.slow_threshold;

        Box::pin(async move {
            let start = Instant::now();
            let method = req.method().to_string();
            let path = req.path().to_string();

            let response = service.call(req).await?;

            let elapsed = start.elapsed();
            let status = response.status().as_u16();

            if elapsed > slow_threshold {
                warn!(
                    "Slow request: {} {} -> {} took {}ms",
                    method,
                    path,
                    status,
                    elapsed.as_millis()
                );
            } else {
                info!("{} {} -> {} in {}ms", method, path, status, elapsed.as_millis());
            }

            Ok(response)
        })
    }
}
