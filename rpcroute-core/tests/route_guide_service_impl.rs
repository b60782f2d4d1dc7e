use futures_util::Stream;
use sample_services::RouteGuide;
use sample_services::routeguide::{Feature, Point, Rectangle, RouteNote, RouteSummary};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming};

/// A feature lying outside every box the tests ask for.
pub const OUTSIDE_FEATURE: &str = "Golden Gate Bridge, San Francisco, CA, USA";

pub fn feature_db() -> Vec<Feature> {
    [
        (
            "Berkshire Valley Management Area Trail, Jefferson, NJ, USA",
            409146138,
            -746188906,
        ),
        ("Patriots Path, Mendham, NJ 07945, USA", 407838351, -746143763),
        (
            "101 New Jersey 10, Whippany, NJ 07981, USA",
            408122808,
            -743999179,
        ),
        ("U.S. 6, Shohola, PA 18458, USA", 413628156, -749015468),
        ("5 Conners Road, Kingston, NY 12401, USA", 419999544, -740371136),
        (
            "Mid Hudson Psychiatric Center, New Hampton, NY 10958, USA",
            414008389,
            -743951297,
        ),
        ("3 Drake Lane, Pennington, NJ 08534, USA", 402948455, -747903913),
        (
            "6324 8th Avenue, Brooklyn, NY 11220, USA",
            406337092,
            -740122226,
        ),
        (OUTSIDE_FEATURE, 378199000, -1224783000),
    ]
    .into_iter()
    .map(|(name, latitude, longitude)| Feature {
        name: name.to_string(),
        location: Some(Point {
            latitude,
            longitude,
        }),
    })
    .collect()
}

pub struct RouteGuideImpl {
    features: Arc<Vec<Feature>>,
}

impl RouteGuideImpl {
    pub fn new() -> Self {
        Self {
            features: Arc::new(feature_db()),
        }
    }
}

#[tonic::async_trait]
impl RouteGuide for RouteGuideImpl {
    type ListFeaturesStream = ReceiverStream<Result<Feature, Status>>;
    type RouteChatStream = Pin<Box<dyn Stream<Item = Result<RouteNote, Status>> + Send>>;

    async fn get_feature(&self, request: Request<Point>) -> Result<Response<Feature>, Status> {
        let point = request.into_inner();

        let feature = self
            .features
            .iter()
            .find(|f| f.location.as_ref() == Some(&point))
            .cloned()
            .unwrap_or(Feature {
                name: String::new(),
                location: Some(point),
            });

        Ok(Response::new(feature))
    }

    async fn list_features(
        &self,
        request: Request<Rectangle>,
    ) -> Result<Response<Self::ListFeaturesStream>, Status> {
        let rect = request.into_inner();
        let (lo, hi) = match (rect.lo, rect.hi) {
            (Some(lo), Some(hi)) => (lo, hi),
            _ => return Err(Status::invalid_argument("Both corners are required")),
        };

        let features = self.features.clone();
        let (tx, rx) = mpsc::channel(4);

        tokio::spawn(async move {
            for feature in features.iter() {
                let Some(location) = &feature.location else {
                    continue;
                };
                if in_range(location, &lo, &hi) && tx.send(Ok(feature.clone())).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn record_route(
        &self,
        request: Request<Streaming<Point>>,
    ) -> Result<Response<RouteSummary>, Status> {
        let mut stream = request.into_inner();
        let start = Instant::now();

        let mut summary = RouteSummary::default();
        let mut last_point: Option<Point> = None;

        while let Some(point) = stream.next().await {
            let point = point?;
            summary.point_count += 1;

            if self
                .features
                .iter()
                .any(|f| f.location.as_ref() == Some(&point))
            {
                summary.feature_count += 1;
            }

            if let Some(last) = &last_point {
                summary.distance += calc_distance(last, &point);
            }
            last_point = Some(point);
        }

        summary.elapsed_time = start.elapsed().as_secs() as i32;
        Ok(Response::new(summary))
    }

    async fn route_chat(
        &self,
        request: Request<Streaming<RouteNote>>,
    ) -> Result<Response<Self::RouteChatStream>, Status> {
        let mut in_stream = request.into_inner();
        let (tx, rx) = mpsc::channel(128);

        tokio::spawn(async move {
            let mut notes: HashMap<(i32, i32), Vec<RouteNote>> = HashMap::new();

            while let Some(result) = in_stream.next().await {
                match result {
                    Ok(note) => {
                        let key = note
                            .location
                            .as_ref()
                            .map(|p| (p.latitude, p.longitude))
                            .unwrap_or_default();
                        let previous = notes.entry(key).or_default();

                        for prior in previous.iter() {
                            if tx.send(Ok(prior.clone())).await.is_err() {
                                return;
                            }
                        }
                        previous.push(note);
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}

fn in_range(point: &Point, lo: &Point, hi: &Point) -> bool {
    let left = lo.longitude.min(hi.longitude);
    let right = lo.longitude.max(hi.longitude);
    let bottom = lo.latitude.min(hi.latitude);
    let top = lo.latitude.max(hi.latitude);

    point.longitude >= left
        && point.longitude <= right
        && point.latitude >= bottom
        && point.latitude <= top
}

/// Great-circle distance between two points, in metres.
fn calc_distance(p1: &Point, p2: &Point) -> i32 {
    const CORD_FACTOR: f64 = 1e7;
    const R: f64 = 6_371_000.0;

    let lat1 = (p1.latitude as f64 / CORD_FACTOR).to_radians();
    let lat2 = (p2.latitude as f64 / CORD_FACTOR).to_radians();
    let lng1 = (p1.longitude as f64 / CORD_FACTOR).to_radians();
    let lng2 = (p2.longitude as f64 / CORD_FACTOR).to_radians();

    let delta_lat = lat2 - lat1;
    let delta_lng = lng2 - lng1;

    let a = (delta_lat / 2f64).sin() * (delta_lat / 2f64).sin()
        + lat1.cos() * lat2.cos() * (delta_lng / 2f64).sin() * (delta_lng / 2f64).sin();
    let c = 2f64 * a.sqrt().atan2((1f64 - a).sqrt());

    (R * c) as i32
}
