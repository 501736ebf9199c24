use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for QuizLive Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::admin::start_session,
        crate::routes::admin::list_sessions,
        crate::routes::admin::reset_sessions,
        crate::routes::admin::session_status,
        crate::routes::admin::dispatch_action,
        crate::routes::admin::final_results,
        crate::routes::admin::question_results,
        crate::routes::player::join,
        crate::routes::player::status,
        crate::routes::player::question_info,
        crate::routes::player::submit_answer,
        crate::routes::player::question_results,
        crate::routes::player::final_results,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::admin::StartSessionRequest,
            crate::dto::admin::QuestionInput,
            crate::dto::admin::AnswerInput,
            crate::dto::admin::StartSessionResponse,
            crate::dto::admin::ActionRequest,
            crate::dto::admin::SessionListResponse,
            crate::dto::admin::SessionStatusResponse,
            crate::dto::admin::ResetResponse,
            crate::dto::player::JoinRequest,
            crate::dto::player::JoinResponse,
            crate::dto::player::PlayerStatusResponse,
            crate::dto::player::SubmitAnswerRequest,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::StateChangedEvent,
            crate::dto::sse::QuestionClosedEvent,
            crate::dto::sse::PlayerJoinedEvent,
            crate::state::state_machine::SessionState,
            crate::state::state_machine::SessionAction,
            crate::state::scoring::QuestionResult,
            crate::state::scoring::AnswerInformation,
            crate::state::scoring::PlayerAward,
            crate::state::results::FinalResults,
            crate::state::results::PlayerStanding,
            crate::state::results::QuestionInfo,
            crate::state::results::AnswerChoice,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "admin", description = "Session administration"),
        (name = "players", description = "Guest players"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/healthcheck",
            "/sse/public",
            "/admin/sessions",
            "/admin/sessions/{id}",
            "/admin/sessions/{id}/action",
            "/admin/sessions/{id}/results",
            "/admin/sessions/{id}/question-results",
            "/players/join",
            "/players/{id}",
            "/players/{id}/questions/{position}",
            "/players/{id}/questions/{position}/answer",
            "/players/{id}/questions/{position}/results",
            "/players/{id}/results",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
