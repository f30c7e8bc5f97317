use chrono::{NaiveDate, Utc};
use routebind::context::AbortSignal;
use routebind::dispatcher::{Handler, Json};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{TestModel, UserRole};
use crate::requests::SampleGetRequest;

pub struct SampleGetController;

impl Handler for SampleGetController {
    type Request = SampleGetRequest;
    type Response = Json<TestModel>;

    fn handle(&self, req: SampleGetRequest, _signal: &AbortSignal) -> Json<TestModel> {
        if let Some(tenant) = &req.tenant {
            req.context.response().set_header("x-tenant", tenant.clone());
        }
        Json(TestModel {
            string_value: req.sample_string,
            char_value: 'r',
            bool_value: req.route_int % 2 == 0,
            byte_value: u8::try_from(req.route_int.clamp(0, 255)).unwrap_or_default(),
            short_value: i16::try_from(req.integer_value).unwrap_or_default(),
            int_value: req.route_int,
            long_value: i64::from(req.route_int) * i64::from(req.integer_value),
            unsigned_value: u64::from(req.route_int.unsigned_abs()),
            float_value: req.integer_value as f32 / 2.0,
            double_value: f64::from(req.integer_value) / 3.0,
            decimal_value: Decimal::new(i64::from(req.integer_value), 2),
            guid_value: Uuid::new_v4(),
            date_value: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            timestamp_value: Utc::now(),
            nullable_int: (req.integer_value != 0).then_some(req.integer_value),
            role: UserRole::Member,
        })
    }
}
