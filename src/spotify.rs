use std::collections::HashMap;

use anyhow::ensure;
use anyhow::Context;
use attohttpc::Session;
use serde::Deserialize;
use tracing::debug;
use tracing::info;

use crate::catalog::Album;
use crate::catalog::Catalog;

const ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";
const API_BASE_URL: &str = "https://api.spotify.com";
const ALBUM_BASE_URL: &str = "https://open.spotify.com/album";

#[derive(Debug, Deserialize)]
struct TokenResp {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Artist {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<Artist>,
}

#[derive(Debug, Deserialize)]
struct SearchResp {
    artists: Page<Artist>,
    albums: Page<SpotifyAlbum>,
}

/// Builds artist catalogs from the Spotify Web API.
pub struct Spotify {
    client_id: String,
    client_secret: String,

    /// Base URL of the token endpoint.
    accounts_url: String,

    /// Base URL of the Web API.
    api_url: String,

    sess: Session,
}

impl Spotify {
    pub fn builder() -> SpotifyBuilder {
        SpotifyBuilder::default()
    }

    /// Looks up the artist best matching `query` and lists all of its albums and
    /// singles. Returns `None` when the search finds no artist.
    pub fn catalog(&self, query: &str) -> anyhow::Result<Option<Catalog>> {
        ensure!(!query.trim().is_empty(), "Empty search");
        let token = self.access_token()?;

        let artist = match self.find_artist(&token, query)? {
            Some(artist) => artist,
            None => return Ok(None),
        };
        info!(artist = artist.name, id = artist.id, "Found artist");

        let albums = self
            .artist_albums(&token, &artist.id)?
            .into_iter()
            .map(|album| Album {
                url: Some(format!("{}/{}", ALBUM_BASE_URL, album.id)),
                id: Some(album.id),
                name: album.name,
            })
            .collect();

        Ok(Some(Catalog {
            artist_id: Some(artist.id),
            artist_name: artist.name,
            albums,
        }))
    }

    fn access_token(&self) -> anyhow::Result<String> {
        let resp = self
            .sess
            .post(format!("{}/api/token", self.accounts_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])?
            .send()?
            .error_for_status()
            .context("Spotify rejected the client credentials")?;
        let token: TokenResp = resp.json_utf8()?;
        Ok(token.access_token)
    }

    fn find_artist(&self, token: &str, query: &str) -> anyhow::Result<Option<Artist>> {
        let resp = self
            .sess
            .get(format!("{}/v1/search", self.api_url))
            .bearer_auth(token)
            .param("q", query)
            .param("type", "artist,album")
            .param("limit", 5)
            .send()?
            .error_for_status()?;
        let search: SearchResp = resp.json_utf8()?;

        let from_artists = search.artists.items.into_iter().next();
        let from_albums = search
            .albums
            .items
            .into_iter()
            .next()
            .and_then(|album| album.artists.into_iter().next());
        Ok(from_artists.or(from_albums))
    }

    fn artist_albums(&self, token: &str, artist_id: &str) -> anyhow::Result<Vec<SpotifyAlbum>> {
        let mut next_link = Some(format!(
            "{}/v1/artists/{}/albums?include_groups=album,single&limit=50",
            self.api_url, artist_id
        ));
        let mut albums: Vec<SpotifyAlbum> = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();

        while let Some(link) = next_link {
            debug!(link, "Fetching albums");
            let resp = self.sess.get(&link).bearer_auth(token).send()?.error_for_status()?;
            let page: Page<SpotifyAlbum> = resp.json_utf8()?;

            // Same-named releases collapse into one entry: first position, last one wins.
            for album in page.items {
                match by_name.get(&album.name) {
                    Some(&i) => albums[i] = album,
                    None => {
                        by_name.insert(album.name.clone(), albums.len());
                        albums.push(album);
                    }
                }
            }

            next_link = page.next;
        }

        Ok(albums)
    }
}

#[derive(Debug)]
pub struct SpotifyBuilder {
    client_id: String,
    client_secret: String,
    accounts_url: String,
    api_url: String,
}

impl SpotifyBuilder {
    pub fn credentials<S: Into<String>>(mut self, client_id: S, client_secret: S) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    pub fn accounts_url(mut self, accounts_url: String) -> Self {
        self.accounts_url = accounts_url;
        self
    }

    pub fn api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    pub fn build(self) -> Spotify {
        Spotify {
            client_id: self.client_id,
            client_secret: self.client_secret,
            accounts_url: self.accounts_url,
            api_url: self.api_url,
            sess: Session::new(),
        }
    }
}

impl Default for SpotifyBuilder {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            accounts_url: String::from(ACCOUNTS_BASE_URL),
            api_url: String::from(API_BASE_URL),
        }
    }
}
