use uuid::Uuid;

pub fn upload_key(file_id: Uuid) -> String {
    format!("uploads/{}", file_id)
}

pub fn output_key(job_id: Uuid) -> String {
    format!("converted/{}", job_id)
}
