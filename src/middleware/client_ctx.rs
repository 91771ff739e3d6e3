use crate::constants::SESSION_USER_ID;
use crate::error::Error as AppError;
use crate::orm::users::{self, Role};
use crate::role::Capabilities;
use actix::fut::ready;
use actix_session::Session;
use actix_web::dev::{
    self, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{LocalBoxFuture, Ready};
use sea_orm::{DatabaseConnection, EntityTrait};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// The signed-in user, resolved once per request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub role: Role,
    pub name: String,
}

impl From<&users::Model> for CurrentUser {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id.clone(),
            role: user.role,
            name: crate::articles::view::display_name(
                user.username.as_deref(),
                user.first_name.as_deref(),
                user.last_name.as_deref(),
            ),
        }
    }
}

/// Client data stored for a single request cycle.
#[derive(Clone, Debug)]
pub struct ClientCtxInner {
    /// User data. Optional. None is an anonymous reader.
    pub client: Option<CurrentUser>,
    /// Time the request started.
    pub request_start: Instant,
}

impl Default for ClientCtxInner {
    fn default() -> Self {
        Self {
            client: None,
            request_start: Instant::now(),
        }
    }
}

impl ClientCtxInner {
    pub async fn from_session(session: &Session, db: &DatabaseConnection) -> Self {
        let user_id = match session.get::<String>(SESSION_USER_ID) {
            Ok(id) => id,
            Err(err) => {
                log::debug!("Discarding unreadable session: {}", err);
                None
            }
        };

        let client = match user_id {
            Some(id) => match users::Entity::find_by_id(id.clone()).one(db).await {
                Ok(Some(user)) => Some(CurrentUser::from(&user)),
                Ok(None) => {
                    // Session outlived the account.
                    log::debug!("Session references unknown user {}", id);
                    None
                }
                Err(err) => {
                    log::error!("Unable to resolve session user {}: {}", id, err);
                    None
                }
            },
            None => None,
        };

        ClientCtxInner {
            client,
            ..Default::default()
        }
    }
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug)]
pub struct ClientCtx(Data<ClientCtxInner>);

impl Default for ClientCtx {
    fn default() -> Self {
        Self(Data::new(ClientCtxInner::default()))
    }
}

impl ClientCtx {
    pub fn get_or_default_from_extensions(extensions: &mut Extensions) -> Self {
        match extensions.get::<Data<ClientCtxInner>>() {
            Some(cbox) => Self(cbox.clone()),
            None => {
                let cbox = Data::new(ClientCtxInner::default());
                extensions.insert(cbox.clone());
                Self(cbox)
            }
        }
    }

    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<&str> {
        self.0.client.as_ref().map(|u| u.id.as_str())
    }

    /// Returns either the user's name or the word for a reader.
    pub fn get_name(&self) -> String {
        match &self.0.client {
            Some(user) => user.name.to_owned(),
            None => "Guest".to_owned(),
        }
    }

    pub fn get_user(&self) -> Option<&CurrentUser> {
        self.0.client.as_ref()
    }

    pub fn can(&self, capability: Capabilities) -> bool {
        self.0
            .client
            .as_ref()
            .map_or(false, |u| u.role.capabilities().contains(capability))
    }

    /// Returns Duration representing request time.
    pub fn request_time(&self) -> Duration {
        Instant::now() - self.0.request_start
    }

    /// Require user to be logged in. Returns user_id or Unauthorized.
    pub fn require_login(&self) -> Result<&str, AppError> {
        self.get_id().ok_or(AppError::Unauthorized)
    }

    /// Require an admin or developer.
    pub fn require_admin(&self) -> Result<&str, AppError> {
        let id = self.require_login()?;
        if self.can(Capabilities::ADMINISTER) {
            Ok(id)
        } else {
            Err(AppError::forbidden("Forbidden: Admin access required"))
        }
    }

    /// Require a developer.
    pub fn require_developer(&self) -> Result<&str, AppError> {
        let id = self.require_login()?;
        if self.can(Capabilities::MAINTAIN) {
            Ok(id)
        } else {
            Err(AppError::forbidden("Forbidden: Developer access required"))
        }
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(ClientCtx::get_or_default_from_extensions(
            &mut req.extensions_mut(),
        )))
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ClientCtxMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ClientCtxMiddleware {
            service: Rc::new(service),
        }))
    }
}

/// Client context middleware
pub struct ClientCtxMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();

        // Borrows of `req` must be done in a precise way to avoid conflicts. This order is important.
        let (httpreq, payload) = req.into_parts();
        let session = Session::extract(&httpreq).into_inner();
        let req = ServiceRequest::from_parts(httpreq, payload);

        Box::pin(async move {
            if let Some(db) = req.app_data::<Data<DatabaseConnection>>() {
                let db = db.clone();

                match session {
                    Ok(session) => {
                        let inner = ClientCtxInner::from_session(&session, &db).await;
                        req.extensions_mut().insert(Data::new(inner));
                    }
                    Err(err) => {
                        log::error!("Unable to extract Session data in middleware: {}", err);
                    }
                };
            }

            let ctx = ClientCtx::get_or_default_from_extensions(&mut req.extensions_mut());
            let res = svc.call(req).await;
            log::debug!("Request by {} took {:?}", ctx.get_name(), ctx.request_time());
            res
        })
    }
}
