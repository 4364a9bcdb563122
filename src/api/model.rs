use axum::extract::State;
use axum::Json;

use crate::api::AppState;
use crate::inference::models::model::ModelInfo;

pub(crate) async fn handle_model_info(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(state.model.info())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::api::tests::{app, get, parse, send};
    use crate::inference::client::testing::ScriptedGenerator;
    use crate::inference::models::model::{ModelInfo, ModelSource};

    #[tokio::test]
    async fn reports_loaded_model() {
        let (status, body) = send(
            app(ScriptedGenerator::replying(""), false),
            get("/v1/model/info"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let info: ModelInfo = parse(body);
        assert_eq!(info.model_name, "scripted");
        assert_eq!(info.source, ModelSource::Local);
        assert_eq!(info.device, "cpu");
    }
}
