use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::CatalogApi;
use crate::error::{AggregationError, CatalogError, DetailPart};
use crate::models::{CastMember, MovieId, MovieView, Video, VideoKind};

pub const MAX_CAST: usize = 10;
pub const MAX_VIDEOS: usize = 3;

/// Builds the detail view for one movie from three concurrent catalog requests.
#[derive(Clone)]
pub struct DetailAggregator {
    catalog: Arc<dyn CatalogApi>,
}

impl DetailAggregator {
    pub fn new(catalog: Arc<dyn CatalogApi>) -> Self {
        Self { catalog }
    }

    /// All-or-nothing: the first sub-request to fail cancels the others and no view is built.
    pub async fn aggregate(&self, id: MovieId) -> Result<MovieView, AggregationError> {
        let fail = |part: DetailPart| move |source: CatalogError| AggregationError {
            movie_id: id,
            part,
            source,
        };

        let (detail, cast, videos) = tokio::try_join!(
            async { self.catalog.movie_detail(id).await.map_err(fail(DetailPart::Detail)) },
            async { self.catalog.credits(id).await.map_err(fail(DetailPart::Credits)) },
            async { self.catalog.videos(id).await.map_err(fail(DetailPart::Videos)) },
        )
        .map_err(|e| {
            warn!(movie_id = id, part = %e.part, error = %e.source, "Detail aggregation failed");
            e
        })?;

        let cast = top_cast(cast);
        let videos = rank_videos(videos);
        let trailer = select_trailer(&videos).cloned();
        debug!(
            movie_id = id,
            cast = cast.len(),
            videos = videos.len(),
            has_trailer = trailer.is_some(),
            "Detail aggregated"
        );

        Ok(MovieView {
            detail,
            cast,
            videos,
            trailer,
        })
    }
}

fn top_cast(mut cast: Vec<CastMember>) -> Vec<CastMember> {
    cast.truncate(MAX_CAST);
    cast
}

/// Trailers and teasers only: official first, then trailers before teasers,
/// otherwise catalog order. At most [`MAX_VIDEOS`].
pub fn rank_videos(videos: Vec<Video>) -> Vec<Video> {
    let mut ranked: Vec<Video> = videos
        .into_iter()
        .filter(|v| matches!(v.kind, VideoKind::Trailer | VideoKind::Teaser))
        .collect();
    // sort_by_key is stable, so equal keys keep catalog order.
    ranked.sort_by_key(|v| (!v.official, v.kind != VideoKind::Trailer));
    ranked.truncate(MAX_VIDEOS);
    ranked
}

/// First YouTube video of the ranked list, else the first video.
pub fn select_trailer(ranked: &[Video]) -> Option<&Video> {
    ranked
        .iter()
        .find(|v| v.is_youtube())
        .or_else(|| ranked.first())
}
