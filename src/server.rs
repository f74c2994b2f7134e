// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/server.rs - 遮蔽 HTTP 接口
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{DefaultBodyLimit, Multipart, State},
  http::StatusCode,
  routing::post,
};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};
use tracing::warn;

use crate::{
  mask::MaskRegions,
  model::Detector,
  store::ObjectStore,
  task::{MaskRequest, MaskResponse, MaskTask},
};

pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// 处理一次遮蔽请求，返回 HTTP 状态码与响应体
///
/// 在阻塞线程池中调用。
pub trait MaskService: Send + Sync + 'static {
  fn handle(&self, request: &MaskRequest) -> (u16, MaskResponse);
}

impl<S, D, M> MaskService for MaskTask<S, D, M>
where
  S: ObjectStore + Send + Sync + 'static,
  D: Detector + Send + Sync + 'static,
  M: MaskRegions + Send + Sync + 'static,
{
  fn handle(&self, request: &MaskRequest) -> (u16, MaskResponse) {
    let report = self.run(request);
    (report.status_code(), report.response())
  }
}

type Reply = (StatusCode, Json<MaskResponse>);

fn reject(status: StatusCode, error: impl Into<String>) -> Reply {
  let error = error.into();
  warn!("拒绝请求: {}", error);
  (status, Json(MaskResponse::Errored { error }))
}

/// 读取表单字段 `file` 与 `prompt`，其余字段忽略
async fn read_form(mut multipart: Multipart) -> Result<MaskRequest, Reply> {
  let mut image = None;
  let mut file_name = String::from("upload");
  let mut prompt = None;

  loop {
    let field = match multipart.next_field().await {
      Ok(Some(field)) => field,
      Ok(None) => break,
      Err(e) => return Err(reject(StatusCode::BAD_REQUEST, e.to_string())),
    };
    let name = field.name().map(str::to_string);
    match name.as_deref() {
      Some("file") => {
        if let Some(name) = field.file_name() {
          file_name = name.to_string();
        }
        match field.bytes().await {
          Ok(bytes) => image = Some(bytes.to_vec()),
          Err(e) => return Err(reject(StatusCode::BAD_REQUEST, e.to_string())),
        }
      }
      Some("prompt") => match field.text().await {
        Ok(text) => prompt = Some(text),
        Err(e) => return Err(reject(StatusCode::BAD_REQUEST, e.to_string())),
      },
      _ => {}
    }
  }

  let Some(image) = image else {
    return Err(reject(StatusCode::BAD_REQUEST, "missing form field: file"));
  };
  let Some(prompt) = prompt.filter(|p| !p.trim().is_empty()) else {
    return Err(reject(StatusCode::BAD_REQUEST, "missing form field: prompt"));
  };

  Ok(MaskRequest {
    image,
    file_name,
    prompt,
  })
}

/// POST /mask
async fn mask_handler<T: MaskService>(
  State(task): State<Arc<T>>,
  multipart: Multipart,
) -> Reply {
  let request = match read_form(multipart).await {
    Ok(request) => request,
    Err(reply) => return reply,
  };

  match tokio::task::spawn_blocking(move || task.handle(&request)).await {
    Ok((status, response)) => {
      let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
      (status, Json(response))
    }
    Err(e) => reject(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
  }
}

pub fn router<T: MaskService>(task: Arc<T>) -> Router {
  Router::new()
    .route("/mask", post(mask_handler::<T>))
    .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
    .layer(
      CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(task)
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use axum::{
    body::{Body, to_bytes},
    http::{Method, Request},
  };
  use tower::util::ServiceExt;

  use super::*;

  const BOUNDARY: &str = "zhebi-test-boundary";

  struct FakeTask {
    reply: (u16, MaskResponse),
    seen: Mutex<Vec<MaskRequest>>,
  }

  impl FakeTask {
    fn new(status: u16, response: MaskResponse) -> Arc<Self> {
      Arc::new(Self {
        reply: (status, response),
        seen: Mutex::new(Vec::new()),
      })
    }
  }

  impl MaskService for FakeTask {
    fn handle(&self, request: &MaskRequest) -> (u16, MaskResponse) {
      self.seen.lock().unwrap().push(request.clone());
      self.reply.clone()
    }
  }

  fn form(file: Option<(&str, &[u8])>, prompt: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    if let Some((name, bytes)) = file {
      body.extend_from_slice(
        format!(
          "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
      );
      body.extend_from_slice(bytes);
      body.extend_from_slice(b"\r\n");
    }
    if let Some(prompt) = prompt {
      body.extend_from_slice(
        format!(
          "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"prompt\"\r\n\r\n{prompt}\r\n"
        )
        .as_bytes(),
      );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
      .method(Method::POST)
      .uri("/mask")
      .header(
        "content-type",
        format!("multipart/form-data; boundary={BOUNDARY}"),
      )
      .body(Body::from(body))
      .unwrap()
  }

  async fn send(task: Arc<FakeTask>, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router(task).oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
  }

  #[tokio::test]
  async fn form_fields_reach_the_task() {
    let task = FakeTask::new(
      200,
      MaskResponse::Done {
        result_url: "https://i.ibb.co/x/masked.jpg".to_string(),
      },
    );
    let (status, body) = send(
      Arc::clone(&task),
      form(Some(("dog.jpg", &b"jpeg-bytes"[..])), Some("dog")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
      body,
      serde_json::json!({"status": "done", "result_url": "https://i.ibb.co/x/masked.jpg"})
    );
    let seen = task.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].file_name, "dog.jpg");
    assert_eq!(seen[0].prompt, "dog");
    assert_eq!(seen[0].image, b"jpeg-bytes");
  }

  #[tokio::test]
  async fn missing_fields_are_bad_requests() {
    let task = FakeTask::new(
      200,
      MaskResponse::NoneFound {
        error: "No object detected.".to_string(),
      },
    );

    let (status, body) = send(Arc::clone(&task), form(None, Some("dog"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "errored");
    assert_eq!(body["error"], "missing form field: file");

    let (status, body) = send(Arc::clone(&task), form(Some(("a.jpg", &b"x"[..])), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing form field: prompt");

    let (status, _) = send(Arc::clone(&task), form(Some(("a.jpg", &b"x"[..])), Some("  "))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(task.seen.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn task_status_becomes_http_status() {
    let failed = FakeTask::new(
      500,
      MaskResponse::Errored {
        error: "Grounding DINO prediction failed.".to_string(),
      },
    );
    let (status, body) = send(failed, form(Some(("a.jpg", &b"x"[..])), Some("dog"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
      body,
      serde_json::json!({"status": "errored", "error": "Grounding DINO prediction failed."})
    );

    let none = FakeTask::new(
      200,
      MaskResponse::NoneFound {
        error: "No object detected.".to_string(),
      },
    );
    let (status, body) = send(none, form(Some(("a.jpg", &b"x"[..])), Some("cat"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "none_found");
    assert_eq!(body["error"], "No object detected.");
  }
}
