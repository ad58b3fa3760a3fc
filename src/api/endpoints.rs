use crate::api::models::{
    ActiveReservations, AuthResponse, Detection, LoginRequest, Lot, LotId, LotQuery,
    MessageResponse, NewUser, ProfileUpdate, Reservation, ReservationId, SpacesUpdate, User,
    UserId,
};
use crate::api::{ApiClient, Auth};
use crate::error::ClientError;
use crate::forms::{LoginForm, ProfileForm, RegisterForm, ReservationForm, ValidationErrors};
use crate::routes::Route;
use crate::session::UserPatch;
use reqwest::Method;
use tracing::{debug, info};

impl ApiClient {
    /// `POST /auth/login`; on success the session is signed in and the role's
    /// home view returned.
    pub async fn login(&self, form: &LoginForm) -> Result<Route, ClientError> {
        form.validate().map_err(ClientError::Validation)?;
        let request = LoginRequest {
            email: form.email.trim(),
            password: &form.password,
        };
        let builder = self.request(Method::POST, "/auth/login").json(&request);
        let auth: AuthResponse = self.execute(builder, Auth::Anonymous).await?;
        self.session().login(auth.usuario, auth.token)
    }

    /// `POST /usuarios/`
    pub async fn register(&self, form: &RegisterForm) -> Result<User, ClientError> {
        form.validate().map_err(ClientError::Validation)?;
        let Some(rol) = form.rol.as_ref() else {
            let mut errors = ValidationErrors::new();
            errors.add("rol", "select a role");
            return Err(ClientError::Validation(errors));
        };
        let request = NewUser {
            nombre: form.nombre.trim(),
            email: form.email.trim(),
            password: &form.password,
            rol,
        };
        let builder = self.request(Method::POST, "/usuarios/").json(&request);
        let user: User = self.execute(builder, Auth::Anonymous).await?;
        info!(user_id = user.id, "Account created");
        Ok(user)
    }

    /// Creates the account, then signs in with the same credentials.
    pub async fn register_and_login(&self, form: &RegisterForm) -> Result<Route, ClientError> {
        self.register(form).await?;
        let login = LoginForm {
            email: form.email.clone(),
            password: form.password.clone(),
        };
        self.login(&login).await
    }

    /// `GET /usuarios/me`
    pub async fn me(&self) -> Result<User, ClientError> {
        let builder = self.request(Method::GET, "/usuarios/me");
        self.execute(builder, Auth::Bearer).await
    }

    /// Reloads the signed-in user from the backend into the session.
    pub async fn refresh_user(&self) -> Result<User, ClientError> {
        if !self.session().is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }
        let user = self.me().await?;
        self.session().update_user(UserPatch::from(user))
    }

    /// `PUT /usuarios/{id}` for the signed-in user.
    pub async fn update_profile(&self, form: &ProfileForm) -> Result<User, ClientError> {
        form.validate().map_err(ClientError::Validation)?;
        let current = self.session().require_user()?;
        let change = form.password_change.as_ref();
        let request = ProfileUpdate {
            nombre: form.nombre.trim(),
            email: form.email.trim(),
            rol: &form.rol,
            current_password: change.map(|c| c.current_password.as_str()),
            new_password: change.map(|c| c.new_password.as_str()),
        };
        let builder = self
            .request(Method::PUT, &format!("/usuarios/{}", current.id))
            .json(&request);
        let updated: User = self.execute(builder, Auth::Bearer).await?;
        self.session().update_user(UserPatch::from(updated))
    }

    /// `GET /estacionamientos`
    pub async fn lots(&self, query: &LotQuery) -> Result<Vec<Lot>, ClientError> {
        let builder = self
            .request(Method::GET, "/estacionamientos")
            .query(&query.params());
        self.execute(builder, Auth::Bearer).await
    }

    /// `GET /estacionamientos/{id}`
    pub async fn lot(&self, lot_id: LotId) -> Result<Lot, ClientError> {
        let builder = self.request(Method::GET, &format!("/estacionamientos/{lot_id}"));
        self.execute(builder, Auth::Bearer).await
    }

    /// `GET /estacionamientos/duenio/{ownerId}`
    pub async fn lots_by_owner(&self, owner_id: UserId) -> Result<Vec<Lot>, ClientError> {
        let builder = self.request(
            Method::GET,
            &format!("/estacionamientos/duenio/{owner_id}"),
        );
        self.execute(builder, Auth::Bearer).await
    }

    /// `PUT /estacionamientos/{id}/espacios`
    pub async fn update_lot_spaces(
        &self,
        lot_id: LotId,
        espacios_disponibles: u32,
    ) -> Result<Lot, ClientError> {
        let builder = self
            .request(
                Method::PUT,
                &format!("/estacionamientos/{lot_id}/espacios"),
            )
            .json(&SpacesUpdate {
                espacios_disponibles,
            });
        self.execute(builder, Auth::Bearer).await
    }

    /// `POST /detect/estacionamiento/` with the bare lot id as the JSON body.
    pub async fn detect(&self, lot_id: LotId) -> Result<Detection, ClientError> {
        let builder = self
            .request(Method::POST, "/detect/estacionamiento/")
            .json(&lot_id);
        let detection: Detection = self.execute(builder, Auth::Bearer).await?;
        debug!(lot_id, available = ?detection.available, "Detection received");
        Ok(detection)
    }

    /// `GET /reservas/activas/{lotId}`; a `404` means no reservations.
    pub async fn active_reservations(&self, lot_id: LotId) -> Result<u32, ClientError> {
        let builder = self.request(Method::GET, &format!("/reservas/activas/{lot_id}"));
        match self.execute::<ActiveReservations>(builder, Auth::Bearer).await {
            Ok(body) => Ok(body.reservas_activas.unwrap_or(0)),
            Err(err) if err.is_not_found() => {
                debug!(lot_id, "No active reservations recorded");
                Ok(0)
            }
            Err(err) => Err(err),
        }
    }

    /// `GET /reservas/pendientes/{ownerId}`
    pub async fn pending_reservations(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<Reservation>, ClientError> {
        let builder = self.request(Method::GET, &format!("/reservas/pendientes/{owner_id}"));
        self.execute(builder, Auth::Bearer).await
    }

    /// `PUT /reservas/{id}/aceptar`
    pub async fn accept_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<MessageResponse, ClientError> {
        let builder = self.request(
            Method::PUT,
            &format!("/reservas/{reservation_id}/aceptar"),
        );
        let response = self.execute(builder, Auth::Bearer).await?;
        info!(reservation_id, "Reservation accepted");
        Ok(response)
    }

    /// `PUT /reservas/{id}/rechazar`
    pub async fn reject_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<MessageResponse, ClientError> {
        let builder = self.request(
            Method::PUT,
            &format!("/reservas/{reservation_id}/rechazar"),
        );
        let response = self.execute(builder, Auth::Bearer).await?;
        info!(reservation_id, "Reservation rejected");
        Ok(response)
    }

    /// `POST /reservas/` for the signed-in user. The form is checked against
    /// `reservable_now` first; a rejected form sends nothing.
    pub async fn create_reservation(
        &self,
        lot_id: LotId,
        form: &ReservationForm,
        reservable_now: u32,
    ) -> Result<MessageResponse, ClientError> {
        form.validate(reservable_now).map_err(ClientError::Validation)?;
        let user = self.session().require_user()?;
        let request = form.to_request(lot_id, user.id);
        let builder = self.request(Method::POST, "/reservas/").json(&request);
        let response = self.execute(builder, Auth::Bearer).await?;
        info!(lot_id, user_id = user.id, "Reservation requested");
        Ok(response)
    }

    /// `GET /reservas/usuario/{userId}`
    pub async fn user_reservations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Reservation>, ClientError> {
        let builder = self.request(Method::GET, &format!("/reservas/usuario/{user_id}"));
        self.execute(builder, Auth::Bearer).await
    }

    /// `PUT /reservas/{id}/cancelar?usuario_id=` for the signed-in user.
    pub async fn cancel_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<MessageResponse, ClientError> {
        let user = self.session().require_user()?;
        let builder = self
            .request(
                Method::PUT,
                &format!("/reservas/{reservation_id}/cancelar"),
            )
            .query(&[("usuario_id", user.id)]);
        let response = self.execute(builder, Auth::Bearer).await?;
        info!(reservation_id, "Reservation cancelled");
        Ok(response)
    }
}
