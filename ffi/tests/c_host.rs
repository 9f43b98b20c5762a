//! Drives the C surface the way a native host would: build through FFI,
//! execute with ureq, feed the raw response back through FFI.

use std::ffi::{c_char, CStr, CString};

use oyster_ffi::types::{FfiDataTag, FfiErrorCode, FfiHttpMethod, FfiHttpRequest, FfiHttpResponse};
use oyster_ffi::*;

struct Host {
    agent: ureq::Agent,
    cookie: Option<String>,
}

fn c_str<'a>(ptr: *const c_char) -> &'a str {
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap()
}

impl Host {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            cookie: None,
        }
    }

    /// Execute and free the request; return status and body.
    fn execute(&mut self, req: *mut FfiHttpRequest) -> (u16, CString) {
        assert!(!req.is_null());
        let r = unsafe { &*req };
        let url = c_str(r.url).to_string();
        let headers: Vec<(String, String)> = (0..r.headers_len as usize)
            .map(|i| {
                let h = unsafe { &*r.headers.add(i) };
                (c_str(h.key).to_string(), c_str(h.value).to_string())
            })
            .collect();
        let body = (!r.body.is_null()).then(|| c_str(r.body).to_string());
        let method = r.method;
        oyster_free_request(req);

        let cookie = self.cookie.clone();
        let mut response = match method {
            FfiHttpMethod::Get => {
                let mut b = self.agent.get(&url);
                for (k, v) in &headers {
                    b = b.header(k, v);
                }
                if let Some(c) = &cookie {
                    b = b.header("cookie", c);
                }
                b.call()
            }
            FfiHttpMethod::Post | FfiHttpMethod::Put => {
                let mut b = if method == FfiHttpMethod::Post {
                    self.agent.post(&url)
                } else {
                    self.agent.put(&url)
                };
                for (k, v) in &headers {
                    b = b.header(k, v);
                }
                if let Some(c) = &cookie {
                    b = b.header("cookie", c);
                }
                match &body {
                    Some(body) => b.send(body.as_bytes()),
                    None => b.send_empty(),
                }
            }
        }
        .expect("HTTP transport error");

        if let Some(set_cookie) = response
            .headers()
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
        {
            self.cookie = set_cookie.split(';').next().map(str::to_string);
        }
        let status = response.status().as_u16();
        let text = response.body_mut().read_to_string().unwrap_or_default();
        (status, CString::new(text).unwrap())
    }
}

fn start_mock_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}/api")
}

#[test]
fn issue_card_and_travel_through_c_api() {
    let base = CString::new(start_mock_server()).unwrap();
    let client = oyster_client_new(base.as_ptr());
    let mut host = Host::new();

    let first = CString::new("Ada").unwrap();
    let last = CString::new("Lovelace").unwrap();
    let email = CString::new("ada@example.com").unwrap();
    let password = CString::new("secret").unwrap();

    let (status, body) = host.execute(oyster_build_register(
        client,
        first.as_ptr(),
        last.as_ptr(),
        email.as_ptr(),
        password.as_ptr(),
    ));
    let result = oyster_parse_register(client, &FfiHttpResponse { status, body: body.as_ptr() });
    assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Ok);
    oyster_free_result(result);

    let (status, body) = host.execute(oyster_build_login(client, email.as_ptr(), password.as_ptr()));
    let result = oyster_parse_login(client, &FfiHttpResponse { status, body: body.as_ptr() });
    assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Ok);
    oyster_free_result(result);

    let (status, body) = host.execute(oyster_build_register_new_card(client));
    let result = oyster_parse_register_new_card(client, &FfiHttpResponse { status, body: body.as_ptr() });
    let r = unsafe { &*result };
    assert_eq!(r.error_code, FfiErrorCode::Ok);
    assert_eq!(r.data_tag, FfiDataTag::Card);
    let card: serde_json::Value = serde_json::from_str(c_str(r.data)).unwrap();
    let number = card["cardNumber"].as_i64().unwrap();
    oyster_free_result(result);

    let amount = CString::new("5.00").unwrap();
    let (status, body) = host.execute(oyster_build_top_up(client, number, amount.as_ptr()));
    let result = oyster_parse_top_up(client, &FfiHttpResponse { status, body: body.as_ptr() });
    assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Ok);
    oyster_free_result(result);

    let victoria = CString::new("Victoria").unwrap();
    let (status, body) = host.execute(oyster_build_tap_in(client, number, 1, victoria.as_ptr(), 1));
    let result = oyster_parse_tap_in(client, &FfiHttpResponse { status, body: body.as_ptr() });
    let r = unsafe { &*result };
    assert_eq!(r.error_code, FfiErrorCode::Ok);
    assert_eq!(r.data_tag, FfiDataTag::Transaction);
    oyster_free_result(result);

    // Tapping in twice without tapping out is refused by the backend.
    let (status, body) = host.execute(oyster_build_tap_in(client, number, 1, victoria.as_ptr(), 1));
    let result = oyster_parse_tap_in(client, &FfiHttpResponse { status, body: body.as_ptr() });
    let r = unsafe { &*result };
    assert_eq!(r.error_code, FfiErrorCode::Http);
    assert_eq!(r.http_status, 409);
    assert_eq!(r.data_tag, FfiDataTag::ApiError);
    oyster_free_result(result);

    let (status, body) = host.execute(oyster_build_list_transactions(
        client,
        number,
        0,
        10,
        std::ptr::null(),
        std::ptr::null(),
    ));
    let result = oyster_parse_list_transactions(client, &FfiHttpResponse { status, body: body.as_ptr() });
    let r = unsafe { &*result };
    assert_eq!(r.data_tag, FfiDataTag::TransactionPage);
    let page: serde_json::Value = serde_json::from_str(c_str(r.data)).unwrap();
    assert_eq!(page["totalElements"], 2);
    assert_eq!(page["number"], 0);
    oyster_free_result(result);

    oyster_client_free(client);
}
