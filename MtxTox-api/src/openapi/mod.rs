use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Configure Swagger UI endpoints
pub fn configure_swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/api-docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
}

// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::api::handlers::health::health_check,

        // Catalog and parameters
        crate::api::handlers::diagnoses::list_diagnoses,
        crate::api::handlers::diagnoses::get_parameters,
        crate::api::handlers::diagnoses::update_parameters,

        // Cohort
        crate::api::handlers::cohort::compute_cohort,

        // Patients
        crate::api::handlers::patients::get_patient_flags,
        crate::api::handlers::patients::get_evidence
    ),
    components(
        schemas(
            // Entities
            crate::entities::common::ErrorResponse,
            crate::entities::diagnosis::DiagnosisEntry,
            crate::entities::diagnosis::WindowDto,
            crate::entities::diagnosis::FlagDto,
            crate::entities::diagnosis::PatientFlagsResponse,
            crate::entities::diagnosis::CohortRequest,
            crate::entities::diagnosis::CohortResponse,
            crate::entities::diagnosis::PhenotypeRowDto,
            crate::entities::diagnosis::PointDto,
            crate::entities::diagnosis::EvidenceSeries,
            crate::entities::diagnosis::EvidenceResponse,

            // Health handlers
            crate::api::handlers::health::HealthResponse,
            crate::api::handlers::health::DatasetStatus,

            // Domain schemas
            mtx_tox_domain::CombinationMode,
            mtx_tox_domain::RuleParameters,
            mtx_tox_domain::entities::parameters::NeutropeniaParameters,
            mtx_tox_domain::entities::parameters::SevereInfectionParameters,
            mtx_tox_domain::entities::parameters::HepaticParameters,
            mtx_tox_domain::entities::parameters::RenalParameters,
            mtx_tox_domain::entities::parameters::ThrombocytopeniaParameters,
            mtx_tox_domain::entities::parameters::PancreatitisParameters
        )
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "diagnoses", description = "Diagnosis catalog and rule parameters"),
        (name = "cohort", description = "Cohort selection and phenotype export"),
        (name = "patients", description = "Per-patient flags and evidence")
    ),
    info(
        title = "MtxTox API",
        version = "0.1.0",
        description = "Temporal threshold diagnoses over longitudinal laboratory data",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        ),
    ),
    servers(
        (url = "/", description = "Local development server")
    )
)]
pub struct ApiDoc;
